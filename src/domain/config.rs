//! Strategy configuration and validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::error::ConfigError;
use crate::domain::schedule::Interval;

pub const ALLOCATION_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionPlan {
    pub amount: f64,
    pub day_of_month: u32,
    pub month_of_year: u32,
    pub interval: Interval,
}

impl Default for ContributionPlan {
    fn default() -> Self {
        ContributionPlan {
            amount: 0.0,
            day_of_month: 1,
            month_of_year: 1,
            interval: Interval::Monthly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAllocation {
    pub symbol: String,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    MaCross {
        short_period: usize,
        long_period: usize,
    },
    Rsi {
        period: usize,
        buy_threshold: f64,
        sell_threshold: f64,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        std_multiplier: f64,
    },
    Dca,
    SmaBreakout {
        period: usize,
    },
}

impl StrategyKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StrategyKind::MaCross { .. } => "MA_CROSS",
            StrategyKind::Rsi { .. } => "RSI",
            StrategyKind::Macd { .. } => "MACD",
            StrategyKind::Bollinger { .. } => "BOLLINGER",
            StrategyKind::Dca => "DCA",
            StrategyKind::SmaBreakout { .. } => "SMA_BREAKOUT",
        }
    }

    pub fn is_dca(&self) -> bool {
        matches!(self, StrategyKind::Dca)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            StrategyKind::MaCross {
                short_period,
                long_period,
            } => {
                nonzero("short_period", short_period)?;
                nonzero("long_period", long_period)?;
                ordered("short_period", short_period, "long_period", long_period)
            }
            StrategyKind::Rsi {
                period,
                buy_threshold,
                sell_threshold,
            } => {
                nonzero("rsi_period", period)?;
                let in_range = |v: f64| (0.0..=100.0).contains(&v);
                if !in_range(buy_threshold)
                    || !in_range(sell_threshold)
                    || buy_threshold >= sell_threshold
                {
                    return Err(ConfigError::RsiThresholds {
                        buy: buy_threshold,
                        sell: sell_threshold,
                    });
                }
                Ok(())
            }
            StrategyKind::Macd { fast, slow, signal } => {
                nonzero("macd_fast", fast)?;
                nonzero("macd_slow", slow)?;
                nonzero("macd_signal", signal)?;
                ordered("macd_fast", fast, "macd_slow", slow)
            }
            StrategyKind::Bollinger {
                period,
                std_multiplier,
            } => {
                nonzero("bb_period", period)?;
                if !(std_multiplier.is_finite() && std_multiplier > 0.0) {
                    return Err(ConfigError::StdMultiplier(std_multiplier));
                }
                Ok(())
            }
            StrategyKind::Dca => Ok(()),
            StrategyKind::SmaBreakout { period } => nonzero("sma_period", period),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::MaCross {
                short_period,
                long_period,
            } => write!(f, "MA_CROSS({},{})", short_period, long_period),
            StrategyKind::Rsi {
                period,
                buy_threshold,
                sell_threshold,
            } => write!(f, "RSI({},{},{})", period, buy_threshold, sell_threshold),
            StrategyKind::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            StrategyKind::Bollinger {
                period,
                std_multiplier,
            } => write!(f, "BOLLINGER({},{})", period, std_multiplier),
            StrategyKind::Dca => write!(f, "DCA"),
            StrategyKind::SmaBreakout { period } => write!(f, "SMA_BREAKOUT({})", period),
        }
    }
}

fn nonzero(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroPeriod { name });
    }
    Ok(())
}

fn ordered(
    fast_name: &'static str,
    fast: usize,
    slow_name: &'static str,
    slow: usize,
) -> Result<(), ConfigError> {
    if fast >= slow {
        return Err(ConfigError::PeriodOrder {
            fast_name,
            fast,
            slow_name,
            slow,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub sell_ratio: f64,
    pub kind: StrategyKind,
    #[serde(default)]
    pub contribution: Option<ContributionPlan>,
    #[serde(default)]
    pub allocations: Vec<StockAllocation>,
}

impl StrategyConfig {
    /// Fraction of held shares sold on a SELL signal, clamped into (0, 1].
    pub fn effective_sell_ratio(&self) -> f64 {
        if self.sell_ratio > 0.0 && self.sell_ratio <= 1.0 {
            self.sell_ratio
        } else {
            1.0
        }
    }

    pub fn is_multi_asset(&self) -> bool {
        self.kind.is_dca() && !self.allocations.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() && self.allocations.is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if !(self.initial_capital.is_finite() && self.initial_capital >= 0.0) {
            return Err(ConfigError::NegativeCapital(self.initial_capital));
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::DateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        self.kind.validate()?;

        match &self.contribution {
            Some(plan) => validate_plan(plan)?,
            None if self.kind.is_dca() => return Err(ConfigError::MissingContribution),
            None => {}
        }

        if !self.allocations.is_empty() {
            if !self.kind.is_dca() {
                return Err(ConfigError::AllocationsRequireDca);
            }
            validate_allocations(&self.allocations)?;
        }

        Ok(())
    }
}

fn validate_plan(plan: &ContributionPlan) -> Result<(), ConfigError> {
    if !(plan.amount.is_finite() && plan.amount >= 0.0) {
        return Err(ConfigError::ContributionAmount(plan.amount));
    }
    if !(1..=31).contains(&plan.day_of_month) {
        return Err(ConfigError::ContributionDay(plan.day_of_month));
    }
    if !(1..=12).contains(&plan.month_of_year) {
        return Err(ConfigError::ContributionMonth(plan.month_of_year));
    }
    Ok(())
}

pub fn validate_allocations(allocations: &[StockAllocation]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for alloc in allocations {
        if alloc.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if !seen.insert(alloc.symbol.as_str()) {
            return Err(ConfigError::DuplicateSymbol(alloc.symbol.clone()));
        }
        if !(0.0..=1.0).contains(&alloc.ratio) {
            return Err(ConfigError::AllocationRatio {
                symbol: alloc.symbol.clone(),
                ratio: alloc.ratio,
            });
        }
    }

    let total: f64 = allocations.iter().map(|a| a.ratio).sum();
    if (total - 1.0).abs() > ALLOCATION_TOLERANCE {
        return Err(ConfigError::AllocationSum { total });
    }
    Ok(())
}
