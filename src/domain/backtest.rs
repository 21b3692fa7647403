//! Backtest run assembly: validation, dispatch, metrics and the result shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::config::{StrategyConfig, StrategyKind};
use crate::domain::error::{BacktestError, ConfigError};
use crate::domain::indicator::IndicatorType;
use crate::domain::metrics::{MetricsInput, ResultSummary, TradeAccounting, evaluate};
use crate::domain::multi_asset::simulate_multi;
use crate::domain::price::{PriceBar, closes, is_strictly_ordered};
use crate::domain::simulator::simulate;
use crate::domain::trade::{EquityPoint, TradeRecord, finite_or_zero, total_bought};
use crate::ports::data_port::MarketDataPort;

/// Symbol stamped on multi-asset results.
pub const MULTI_ASSET_SYMBOL: &str = "MULTI_ASSET";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    pub ma_short: Vec<Option<f64>>,
    pub ma_long: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_asset_prices: Option<BTreeMap<String, Vec<f64>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityData {
    pub dates: Vec<NaiveDate>,
    pub equity: Vec<f64>,
}

impl EquityData {
    fn from_curve(curve: &[EquityPoint]) -> Self {
        EquityData {
            dates: curve.iter().map(|p| p.date).collect(),
            equity: curve.iter().map(|p| p.total_assets).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub id: u64,
    pub strategy_name: String,
    pub symbol: String,
    pub strategy_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub summary: ResultSummary,
    /// Set when metrics fell back to the zero summary.
    #[serde(default)]
    pub degraded: Option<String>,
    pub price_data: PriceData,
    pub equity_data: EquityData,
    pub trades: Vec<TradeRecord>,
    pub params: StrategyConfig,
}

/// Runs a single-asset backtest over `bars` and stamps the result with `id`.
pub fn run_backtest(
    config: &StrategyConfig,
    bars: &[PriceBar],
    id: u64,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    if config.is_multi_asset() {
        return Err(ConfigError::Invalid {
            section: "allocations".to_string(),
            key: "symbols".to_string(),
            reason: "multi-asset runs need one price series per symbol".to_string(),
        }
        .into());
    }
    if bars.is_empty() {
        return Err(ConfigError::EmptyPriceSeries {
            symbol: config.symbol.clone(),
        }
        .into());
    }
    if !is_strictly_ordered(bars) {
        return Err(ConfigError::UnorderedPriceSeries {
            symbol: config.symbol.clone(),
        }
        .into());
    }

    let indicators = config.kind.compute_indicators(bars);
    let signals = config
        .kind
        .generate_signals(bars, &indicators, config.contribution.as_ref());
    let outcome = simulate(config, bars, &signals)?;

    let total_contributed = outcome.state.total_contributed;
    let input = if config.kind.is_dca() {
        let spent = total_bought(&outcome.trades);
        MetricsInput {
            equity: &outcome.equity,
            trades: &outcome.trades,
            base_capital: spent,
            total_cost: if total_contributed > 0.0 {
                total_contributed
            } else {
                spent
            },
            accounting: TradeAccounting::Accumulation,
        }
    } else {
        MetricsInput {
            equity: &outcome.equity,
            trades: &outcome.trades,
            base_capital: if total_contributed > 0.0 {
                total_contributed
            } else {
                config.initial_capital
            },
            total_cost: total_contributed,
            accounting: TradeAccounting::RoundTrip,
        }
    };
    let (summary, degraded) = evaluate(input).into_parts();

    let (ma_short, ma_long) = match config.kind {
        StrategyKind::MaCross {
            short_period,
            long_period,
        } => (
            indicators
                .get(&IndicatorType::Sma(short_period))
                .map(|s| s.simple_values())
                .unwrap_or_default(),
            indicators
                .get(&IndicatorType::Sma(long_period))
                .map(|s| s.simple_values())
                .unwrap_or_default(),
        ),
        _ => (Vec::new(), Vec::new()),
    };

    let price_data = PriceData {
        dates: bars.iter().map(|b| b.date).collect(),
        prices: closes(bars).into_iter().map(finite_or_zero).collect(),
        ma_short,
        ma_long,
        multi_asset_prices: None,
    };

    tracing::info!(
        id,
        symbol = %config.symbol,
        strategy = %config.kind,
        trades = outcome.trades.len(),
        total_return = summary.total_return,
        "backtest finished"
    );

    Ok(BacktestResult {
        id,
        strategy_name: config.name.clone(),
        symbol: config.symbol.clone(),
        strategy_type: config.kind.type_name().to_string(),
        start_date: config.start_date,
        end_date: config.end_date,
        initial_capital: config.initial_capital,
        final_capital: outcome.final_equity(),
        summary,
        degraded,
        price_data,
        equity_data: EquityData::from_curve(&outcome.equity),
        trades: outcome.trades,
        params: config.clone(),
    })
}

/// Runs a multi-asset DCA backtest. `series` holds one price series per
/// allocated symbol; the first allocation's series is the calendar.
pub fn run_multi_asset(
    config: &StrategyConfig,
    series: &[(String, Vec<PriceBar>)],
    id: u64,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    let plan = match (&config.contribution, config.is_multi_asset()) {
        (Some(plan), true) => plan,
        _ => {
            return Err(ConfigError::Invalid {
                section: "allocations".to_string(),
                key: "symbols".to_string(),
                reason: "multi-asset runs need a DCA strategy with allocations".to_string(),
            }
            .into());
        }
    };

    let outcome = simulate_multi(config, plan, series)?;
    let (summary, degraded) = evaluate(MetricsInput {
        equity: &outcome.equity,
        trades: &outcome.trades,
        base_capital: outcome.total_contributed,
        total_cost: outcome.total_contributed,
        accounting: TradeAccounting::Accumulation,
    })
    .into_parts();

    let multi_asset_prices: BTreeMap<String, Vec<f64>> = config
        .allocations
        .iter()
        .map(|alloc| {
            let prices = series
                .iter()
                .find(|(symbol, _)| *symbol == alloc.symbol)
                .map(|(_, bars)| closes(bars).into_iter().map(finite_or_zero).collect())
                .unwrap_or_default();
            (alloc.symbol.clone(), prices)
        })
        .collect();

    let equity_data = EquityData::from_curve(&outcome.equity);
    let final_capital = equity_data.equity.last().copied().unwrap_or(0.0);

    tracing::info!(
        id,
        assets = config.allocations.len(),
        trades = outcome.trades.len(),
        total_return = summary.total_return,
        "multi-asset backtest finished"
    );

    Ok(BacktestResult {
        id,
        strategy_name: config.name.clone(),
        symbol: MULTI_ASSET_SYMBOL.to_string(),
        strategy_type: config.kind.type_name().to_string(),
        start_date: config.start_date,
        end_date: config.end_date,
        initial_capital: config.initial_capital,
        final_capital,
        summary,
        degraded,
        price_data: PriceData {
            dates: equity_data.dates.clone(),
            prices: Vec::new(),
            ma_short: Vec::new(),
            ma_long: Vec::new(),
            multi_asset_prices: Some(multi_asset_prices),
        },
        equity_data,
        trades: outcome.trades,
        params: config.clone(),
    })
}

/// Fetches every series the configuration needs, then runs the backtest.
pub fn run_full_backtest(
    data: &dyn MarketDataPort,
    config: &StrategyConfig,
    id: u64,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    tracing::info!(id, name = %config.name, strategy = %config.kind, "backtest started");

    if config.is_multi_asset() {
        let mut series = Vec::with_capacity(config.allocations.len());
        for alloc in &config.allocations {
            let bars = data.fetch_prices(&alloc.symbol, config.start_date, config.end_date)?;
            series.push((alloc.symbol.clone(), bars));
        }
        run_multi_asset(config, &series, id)
    } else {
        let bars = data.fetch_prices(&config.symbol, config.start_date, config.end_date)?;
        run_backtest(config, &bars, id)
    }
}
