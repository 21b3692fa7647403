//! Performance metrics derived from a finished equity curve and trade ledger.

use serde::{Deserialize, Serialize};

use crate::domain::trade::{EquityPoint, TradeRecord, finite_or_zero};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const RISK_FREE_RATE: f64 = 0.02;

/// Percent values are in percent (12.5 means 12.5 %).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub profit_trades: usize,
    pub loss_trades: usize,
    pub avg_profit: f64,
    pub avg_loss: f64,
    pub total_cost: f64,
}

impl ResultSummary {
    /// The fallback summary: every statistic zero, only the cost carried.
    pub fn zeroed(total_cost: f64) -> Self {
        ResultSummary {
            total_cost: finite_or_zero(total_cost),
            ..ResultSummary::default()
        }
    }
}

/// Which ledger entries count as trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAccounting {
    /// BUY entries, judged by unrealized return at purchase time.
    Accumulation,
    /// SELL entries, judged by realized pnl.
    RoundTrip,
}

impl TradeAccounting {
    fn counts(self, trade: &TradeRecord) -> bool {
        match self {
            TradeAccounting::Accumulation => trade.is_buy(),
            TradeAccounting::RoundTrip => trade.is_sell(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsInput<'a> {
    pub equity: &'a [EquityPoint],
    pub trades: &'a [TradeRecord],
    pub base_capital: f64,
    pub total_cost: f64,
    pub accounting: TradeAccounting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricsOutcome {
    Computed(ResultSummary),
    Degraded {
        summary: ResultSummary,
        reason: String,
    },
}

impl MetricsOutcome {
    pub fn into_parts(self) -> (ResultSummary, Option<String>) {
        match self {
            MetricsOutcome::Computed(summary) => (summary, None),
            MetricsOutcome::Degraded { summary, reason } => (summary, Some(reason)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum MetricsFailure {
    #[error("equity curve is empty")]
    EmptyCurve,
    #[error("base capital must be a non-negative number, got {0}")]
    InvalidBase(f64),
}

/// Never fails: internal failures produce `MetricsOutcome::Degraded`.
pub fn evaluate(input: MetricsInput<'_>) -> MetricsOutcome {
    match compute(&input) {
        Ok(summary) => MetricsOutcome::Computed(summary),
        Err(failure) => {
            tracing::warn!(reason = %failure, "metrics degraded to zero summary");
            MetricsOutcome::Degraded {
                summary: ResultSummary::zeroed(input.total_cost),
                reason: failure.to_string(),
            }
        }
    }
}

fn compute(input: &MetricsInput<'_>) -> Result<ResultSummary, MetricsFailure> {
    let final_equity = input
        .equity
        .last()
        .map(|p| p.total_assets)
        .ok_or(MetricsFailure::EmptyCurve)?;
    let base = input.base_capital;
    if !(base.is_finite() && base >= 0.0) {
        return Err(MetricsFailure::InvalidBase(base));
    }

    let total_return = if base > 0.0 {
        (final_equity - base) / base * 100.0
    } else {
        0.0
    };

    let years = input.equity.len() as f64 / TRADING_DAYS_PER_YEAR;
    let annualized_return = annualized(final_equity, base, years);

    let totals: Vec<f64> = input.equity.iter().map(|p| p.total_assets).collect();
    let stats = TradeStats::collect(input.trades, input.accounting);

    Ok(ResultSummary {
        total_return: finite_or_zero(total_return),
        annualized_return: finite_or_zero(annualized_return),
        sharpe_ratio: finite_or_zero(sharpe_ratio(&totals)),
        max_drawdown: finite_or_zero(max_drawdown(&totals)),
        win_rate: finite_or_zero(stats.win_rate()),
        total_trades: stats.total,
        profit_trades: stats.profit,
        loss_trades: stats.loss,
        avg_profit: finite_or_zero(stats.avg_profit()),
        avg_loss: finite_or_zero(stats.avg_loss()),
        total_cost: finite_or_zero(input.total_cost),
    })
}

/// Compound annual growth in percent. A non-positive end/base ratio is a total
/// wipeout and reads -100.
pub fn annualized(final_equity: f64, base: f64, years: f64) -> f64 {
    if base <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    let ratio = final_equity / base;
    if ratio <= 0.0 {
        -100.0
    } else {
        (ratio.powf(1.0 / years) - 1.0) * 100.0
    }
}

/// Annualized Sharpe ratio of daily simple returns over a 2 % risk-free rate,
/// using the sample standard deviation.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    let daily_rf = RISK_FREE_RATE / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = equity
        .windows(2)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| !r.is_nan())
        .map(|r| r - daily_rf)
        .collect();

    if excess.len() < 2 {
        return 0.0;
    }

    let n = excess.len() as f64;
    let mean = excess.iter().sum::<f64>() / n;
    let variance = excess.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if !std_dev.is_finite() || std_dev <= 0.0 {
        return 0.0;
    }
    mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Deepest peak-to-trough decline in percent (≤ 0). Points whose running peak
/// is not positive are skipped.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for &value in equity {
        peak = peak.max(value);
        if peak <= 0.0 {
            continue;
        }
        let drawdown = (value - peak) / peak;
        if drawdown < worst {
            worst = drawdown;
        }
    }

    worst * 100.0
}

#[derive(Debug, Default)]
struct TradeStats {
    total: usize,
    profit: usize,
    loss: usize,
    profit_sum: f64,
    loss_sum: f64,
}

impl TradeStats {
    fn collect(trades: &[TradeRecord], accounting: TradeAccounting) -> Self {
        let mut stats = TradeStats::default();
        for trade in trades.iter().filter(|t| accounting.counts(t)) {
            let pnl = trade.pnl.unwrap_or(0.0);
            stats.total += 1;
            if pnl > 0.0 {
                stats.profit += 1;
                stats.profit_sum += pnl;
            } else {
                stats.loss += 1;
                stats.loss_sum += pnl;
            }
        }
        stats
    }

    fn win_rate(&self) -> f64 {
        if self.total > 0 {
            self.profit as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }

    fn avg_profit(&self) -> f64 {
        if self.profit > 0 {
            self.profit_sum / self.profit as f64
        } else {
            0.0
        }
    }

    fn avg_loss(&self) -> f64 {
        if self.loss > 0 {
            self.loss_sum / self.loss as f64
        } else {
            0.0
        }
    }
}
