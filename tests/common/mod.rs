#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use tradesim::domain::config::{ContributionPlan, StockAllocation, StrategyConfig, StrategyKind};
use tradesim::domain::error::BacktestError;
pub use tradesim::domain::price::PriceBar;
use tradesim::domain::schedule::Interval;
use tradesim::ports::data_port::MarketDataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacktestError::MarketData {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date_str: &str, close: f64) -> PriceBar {
    PriceBar::from_close(NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(), close)
}

/// One bar per calendar day starting at `start`.
pub fn daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::from_close(start + chrono::Duration::days(i as i64), c))
        .collect()
}

/// One bar per weekday (Mon-Fri) starting at `start`, `count` bars.
pub fn weekday_bars(start: NaiveDate, count: usize, close: impl Fn(usize) -> f64) -> Vec<PriceBar> {
    use chrono::Datelike;
    start
        .iter_days()
        .filter(|d| d.weekday().number_from_monday() <= 5)
        .take(count)
        .enumerate()
        .map(|(i, d)| PriceBar::from_close(d, close(i)))
        .collect()
}

pub fn monthly_plan(amount: f64, day: u32) -> ContributionPlan {
    ContributionPlan {
        amount,
        day_of_month: day,
        month_of_year: 1,
        interval: Interval::Monthly,
    }
}

pub fn config(kind: StrategyKind, initial_capital: f64) -> StrategyConfig {
    StrategyConfig {
        name: "test".to_string(),
        symbol: "SPY".to_string(),
        start_date: date(2020, 1, 1),
        end_date: date(2030, 12, 31),
        initial_capital,
        sell_ratio: 1.0,
        kind,
        contribution: None,
        allocations: Vec::new(),
    }
}

pub fn dca_config(amount: f64, day: u32) -> StrategyConfig {
    StrategyConfig {
        initial_capital: 0.0,
        contribution: Some(monthly_plan(amount, day)),
        ..config(StrategyKind::Dca, 0.0)
    }
}

pub fn multi_config(amount: f64, allocs: &[(&str, f64)]) -> StrategyConfig {
    StrategyConfig {
        symbol: String::new(),
        allocations: allocs
            .iter()
            .map(|(s, r)| StockAllocation {
                symbol: s.to_string(),
                ratio: *r,
            })
            .collect(),
        ..dca_config(amount, 1)
    }
}
