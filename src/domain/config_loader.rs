//! Builds a `StrategyConfig` from INI-style configuration.
//!
//! ```ini
//! [backtest]
//! name = Monthly VOO
//! symbol = VOO
//! start_date = 2020-01-01
//! end_date = 2024-12-31
//! initial_capital = 0
//! sell_ratio = 1.0
//!
//! [strategy]
//! type = DCA
//!
//! [contribution]
//! amount = 1000
//! day = 1
//! interval = MONTHLY
//!
//! [allocations]
//! symbols = VOO:0.6, QQQ:0.4
//! ```

use chrono::NaiveDate;

use crate::domain::config::{ContributionPlan, StockAllocation, StrategyConfig, StrategyKind};
use crate::domain::error::ConfigError;
use crate::domain::indicator::{bollinger, macd};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;
pub const DEFAULT_CONTRIBUTION: f64 = 10_000.0;

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, ConfigError> {
    let kind = build_kind(config)?;
    let contribution = build_contribution(config, kind.is_dca())?;
    let allocations = match config.get_string("allocations", "symbols") {
        Some(raw) if !raw.trim().is_empty() => parse_allocations(&raw)?,
        _ => Vec::new(),
    };

    let built = StrategyConfig {
        name: config
            .get_string("backtest", "name")
            .unwrap_or_else(|| "Backtest".to_string()),
        symbol: config
            .get_string("backtest", "symbol")
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_default(),
        start_date: parse_date(config, "start_date")?,
        end_date: parse_date(config, "end_date")?,
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        sell_ratio: config.get_double("backtest", "sell_ratio", 1.0),
        kind,
        contribution,
        allocations,
    };

    built.validate()?;
    Ok(built)
}

fn build_kind(config: &dyn ConfigPort) -> Result<StrategyKind, ConfigError> {
    let raw = config
        .get_string("strategy", "type")
        .unwrap_or_else(|| "MA_CROSS".to_string());

    let kind = match raw.trim().to_uppercase().as_str() {
        "MA_CROSS" => StrategyKind::MaCross {
            short_period: get_period(config, "short_period", 5)?,
            long_period: get_period(config, "long_period", 20)?,
        },
        "RSI" => StrategyKind::Rsi {
            period: get_period(config, "rsi_period", 14)?,
            buy_threshold: config.get_double("strategy", "rsi_buy", 30.0),
            sell_threshold: config.get_double("strategy", "rsi_sell", 70.0),
        },
        "MACD" => StrategyKind::Macd {
            fast: get_period(config, "macd_fast", macd::DEFAULT_FAST)?,
            slow: get_period(config, "macd_slow", macd::DEFAULT_SLOW)?,
            signal: get_period(config, "macd_signal", macd::DEFAULT_SIGNAL)?,
        },
        "BOLLINGER" => StrategyKind::Bollinger {
            period: get_period(config, "bb_period", bollinger::DEFAULT_PERIOD)?,
            std_multiplier: config.get_double("strategy", "bb_std", bollinger::DEFAULT_MULTIPLIER),
        },
        "DCA" => StrategyKind::Dca,
        "SMA_BREAKOUT" => StrategyKind::SmaBreakout {
            period: get_period(config, "sma_period", 200)?,
        },
        other => return Err(ConfigError::UnknownStrategy(other.to_string())),
    };
    Ok(kind)
}

/// DCA always gets a plan (default amount when unset); other strategies only
/// when `[contribution] amount` is present.
fn build_contribution(
    config: &dyn ConfigPort,
    dca: bool,
) -> Result<Option<ContributionPlan>, ConfigError> {
    if !dca && config.get_string("contribution", "amount").is_none() {
        return Ok(None);
    }

    let interval = match config.get_string("contribution", "interval") {
        Some(raw) => raw.parse()?,
        None => Default::default(),
    };

    Ok(Some(ContributionPlan {
        amount: config.get_double("contribution", "amount", DEFAULT_CONTRIBUTION),
        day_of_month: get_u32(config, "contribution", "day", 1)?,
        month_of_year: get_u32(config, "contribution", "month", 1)?,
        interval,
    }))
}

fn get_period(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = config.get_int("strategy", key, default as i64);
    usize::try_from(value).map_err(|_| ConfigError::Invalid {
        section: "strategy".to_string(),
        key: key.to_string(),
        reason: format!("must be a non-negative integer, got {}", value),
    })
}

fn get_u32(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    let value = config.get_int(section, key, default as i64);
    u32::try_from(value).map_err(|_| ConfigError::Invalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("must be a non-negative integer, got {}", value),
    })
}

fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, ConfigError> {
    let raw = config
        .get_string("backtest", key)
        .ok_or_else(|| ConfigError::Missing {
            section: "backtest".to_string(),
            key: key.to_string(),
        })?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ConfigError::Invalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: format!("invalid {} format, expected YYYY-MM-DD", key),
    })
}

/// Parses `SYMBOL:RATIO` pairs separated by commas, e.g. `VOO:0.6, QQQ:0.4`.
pub fn parse_allocations(raw: &str) -> Result<Vec<StockAllocation>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let invalid = |reason: String| ConfigError::Invalid {
                section: "allocations".to_string(),
                key: "symbols".to_string(),
                reason,
            };
            let (symbol, ratio) = part
                .split_once(':')
                .ok_or_else(|| invalid(format!("expected SYMBOL:RATIO, got '{}'", part)))?;
            let ratio: f64 = ratio
                .trim()
                .parse()
                .map_err(|_| invalid(format!("invalid ratio in '{}'", part)))?;
            Ok(StockAllocation {
                symbol: symbol.trim().to_uppercase(),
                ratio,
            })
        })
        .collect()
}
