//! Two-parameter grid search over a strategy, evaluated in parallel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::backtest::run_backtest;
use crate::domain::config::{StrategyConfig, StrategyKind};
use crate::domain::error::BacktestError;
use crate::domain::price::PriceBar;

/// Inclusive integer range `min..=max` walked in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: usize,
    pub max: usize,
    pub step: usize,
}

impl ParamRange {
    pub fn new(min: usize, max: usize, step: usize) -> Self {
        ParamRange { min, max, step }
    }

    pub fn values(&self) -> Result<Vec<usize>, BacktestError> {
        if self.step == 0 {
            return Err(BacktestError::Sweep {
                reason: "step must be at least 1".to_string(),
            });
        }
        if self.min > self.max {
            return Err(BacktestError::Sweep {
                reason: format!("range {}..={} is inverted", self.min, self.max),
            });
        }
        Ok((self.min..=self.max).step_by(self.step).collect())
    }
}

/// `param1` is the fast/short/buy side, `param2` the slow/long/sell side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub param1: ParamRange,
    pub param2: ParamRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatCell {
    pub x: usize,
    pub y: usize,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub best_param1: usize,
    pub best_param2: usize,
    pub best_return: f64,
    pub best_sharpe: f64,
    pub heatmap: Vec<HeatCell>,
    pub x_labels: Vec<usize>,
    pub y_labels: Vec<usize>,
}

/// The strategy with its two swept parameters replaced.
fn with_params(kind: &StrategyKind, p1: usize, p2: usize) -> Result<StrategyKind, BacktestError> {
    match *kind {
        StrategyKind::MaCross { .. } => Ok(StrategyKind::MaCross {
            short_period: p1,
            long_period: p2,
        }),
        StrategyKind::Macd { signal, .. } => Ok(StrategyKind::Macd {
            fast: p1,
            slow: p2,
            signal,
        }),
        StrategyKind::Rsi { period, .. } => Ok(StrategyKind::Rsi {
            period,
            buy_threshold: p1 as f64,
            sell_threshold: p2 as f64,
        }),
        StrategyKind::Bollinger { .. } | StrategyKind::Dca | StrategyKind::SmaBreakout { .. } => {
            Err(BacktestError::Sweep {
                reason: format!("{} has no two-parameter grid", kind.type_name()),
            })
        }
    }
}

struct Cell {
    x: usize,
    y: usize,
    p1: usize,
    p2: usize,
}

pub fn optimize(
    bars: &[PriceBar],
    base: &StrategyConfig,
    grid: &SweepGrid,
) -> Result<SweepResult, BacktestError> {
    let x_labels = grid.param1.values()?;
    let y_labels = grid.param2.values()?;
    with_params(&base.kind, grid.param1.min, grid.param2.min)?;

    let cells: Vec<Cell> = x_labels
        .iter()
        .enumerate()
        .flat_map(|(x, &p1)| {
            y_labels
                .iter()
                .enumerate()
                .map(move |(y, &p2)| Cell { x, y, p1, p2 })
        })
        .collect();

    tracing::info!(cells = cells.len(), strategy = base.kind.type_name(), "sweep started");

    let scored: Vec<Option<(f64, f64)>> = cells
        .par_iter()
        .map(|cell| {
            if cell.p2 <= cell.p1 {
                return None;
            }
            let kind = with_params(&base.kind, cell.p1, cell.p2).ok()?;
            let config = StrategyConfig {
                name: format!("Optimize_{}_{}", cell.p1, cell.p2),
                kind,
                ..base.clone()
            };
            match run_backtest(&config, bars, 0) {
                Ok(result) => Some((result.summary.total_return, result.summary.sharpe_ratio)),
                Err(err) => {
                    tracing::debug!(p1 = cell.p1, p2 = cell.p2, error = %err, "sweep cell failed");
                    None
                }
            }
        })
        .collect();

    let mut best: Option<(usize, f64, f64)> = None;
    for (i, score) in scored.iter().enumerate() {
        if let Some((ret, sharpe)) = *score {
            if best.is_none_or(|(_, best_ret, _)| ret > best_ret) {
                best = Some((i, ret, sharpe));
            }
        }
    }

    let (best_index, best_return, best_sharpe) = best.ok_or_else(|| BacktestError::Sweep {
        reason: "no parameter combination produced a result".to_string(),
    })?;

    let heatmap = cells
        .iter()
        .zip(&scored)
        .map(|(cell, score)| HeatCell {
            x: cell.x,
            y: cell.y,
            value: score.map(|(ret, _)| ret),
        })
        .collect();

    Ok(SweepResult {
        best_param1: cells[best_index].p1,
        best_param2: cells[best_index].p2,
        best_return,
        best_sharpe,
        heatmap,
        x_labels,
        y_labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars() -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..120)
            .map(|i| {
                let close = 100.0 + 10.0 * ((i as f64) / 7.0).sin() + i as f64 * 0.1;
                PriceBar::from_close(start + chrono::Duration::days(i), close)
            })
            .collect()
    }

    fn base(kind: StrategyKind) -> StrategyConfig {
        StrategyConfig {
            name: "sweep".into(),
            symbol: "SPY".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            initial_capital: 10_000.0,
            sell_ratio: 1.0,
            kind,
            contribution: None,
            allocations: Vec::new(),
        }
    }

    fn ma() -> StrategyKind {
        StrategyKind::MaCross {
            short_period: 5,
            long_period: 20,
        }
    }

    #[test]
    fn range_values() {
        assert_eq!(ParamRange::new(5, 15, 5).values().unwrap(), vec![5, 10, 15]);
        assert_eq!(ParamRange::new(5, 14, 5).values().unwrap(), vec![5, 10]);
        assert!(ParamRange::new(5, 15, 0).values().is_err());
        assert!(ParamRange::new(20, 15, 1).values().is_err());
    }

    #[test]
    fn grid_skips_non_increasing_pairs() {
        let grid = SweepGrid {
            param1: ParamRange::new(5, 15, 5),
            param2: ParamRange::new(10, 20, 10),
        };
        let result = optimize(&bars(), &base(ma()), &grid).unwrap();

        assert_eq!(result.x_labels, vec![5, 10, 15]);
        assert_eq!(result.y_labels, vec![10, 20]);
        assert_eq!(result.heatmap.len(), 6);

        let cell = |x: usize, y: usize| {
            result
                .heatmap
                .iter()
                .find(|c| c.x == x && c.y == y)
                .unwrap()
                .value
        };
        assert!(cell(0, 0).is_some());
        assert!(cell(1, 0).is_none());
        assert!(cell(2, 0).is_none());
        assert!(cell(2, 1).is_some());
        assert!(result.best_param2 > result.best_param1);
    }

    #[test]
    fn best_cell_has_highest_return() {
        let grid = SweepGrid {
            param1: ParamRange::new(3, 9, 3),
            param2: ParamRange::new(10, 30, 10),
        };
        let result = optimize(&bars(), &base(ma()), &grid).unwrap();
        let max = result
            .heatmap
            .iter()
            .filter_map(|c| c.value)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.best_return, max);
    }

    #[test]
    fn rsi_thresholds_swept() {
        let grid = SweepGrid {
            param1: ParamRange::new(20, 30, 10),
            param2: ParamRange::new(70, 80, 10),
        };
        let kind = StrategyKind::Rsi {
            period: 14,
            buy_threshold: 30.0,
            sell_threshold: 70.0,
        };
        let result = optimize(&bars(), &base(kind), &grid).unwrap();
        assert!(result.heatmap.iter().all(|c| c.value.is_some()));
    }

    #[test]
    fn dca_cannot_be_swept() {
        let grid = SweepGrid {
            param1: ParamRange::new(1, 2, 1),
            param2: ParamRange::new(3, 4, 1),
        };
        let err = optimize(&bars(), &base(StrategyKind::Dca), &grid).unwrap_err();
        assert!(matches!(err, BacktestError::Sweep { .. }));
    }

    #[test]
    fn all_cells_invalid_is_error() {
        let grid = SweepGrid {
            param1: ParamRange::new(10, 20, 10),
            param2: ParamRange::new(5, 10, 5),
        };
        assert!(optimize(&bars(), &base(ma()), &grid).is_err());
    }
}
