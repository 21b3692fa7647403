//! Multi-asset DCA: one shared cash pool, one holding per allocated symbol.
//!
//! Every allocation needs price data; the first allocation's bars are the
//! calendar. On each contribution day the full amount is injected and every
//! asset with a bar that day buys `floor(amount × ratio / close)` shares.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::config::{ContributionPlan, StrategyConfig};
use crate::domain::error::ConfigError;
use crate::domain::portfolio::{Holding, affordable_shares};
use crate::domain::price::{PriceBar, is_strictly_ordered};
use crate::domain::schedule::contribution_days;
use crate::domain::trade::{EquityPoint, TradeAction, TradeRecord};

/// Holding and price lookup for one allocated symbol.
#[derive(Debug, Clone)]
pub struct AssetBook<'a> {
    pub symbol: String,
    pub ratio: f64,
    pub holding: Holding,
    bars: &'a [PriceBar],
    date_index: HashMap<NaiveDate, usize>,
    last_close: Option<f64>,
}

impl<'a> AssetBook<'a> {
    pub fn new(symbol: String, ratio: f64, bars: &'a [PriceBar]) -> Self {
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        AssetBook {
            symbol,
            ratio,
            holding: Holding::default(),
            bars,
            date_index,
            last_close: None,
        }
    }

    pub fn bar_on(&self, date: NaiveDate) -> Option<&'a PriceBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Moves the mark to `date` if the asset traded that day.
    fn mark(&mut self, date: NaiveDate) -> Option<f64> {
        let close = self.bar_on(date)?.close;
        self.last_close = Some(close);
        Some(close)
    }

    /// Holding valued at the most recent close seen, 0 before the first one.
    pub fn market_value(&self) -> f64 {
        self.last_close
            .map(|price| self.holding.market_value(price))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiAssetOutcome {
    pub trades: Vec<TradeRecord>,
    pub equity: Vec<EquityPoint>,
    pub cash: f64,
    pub total_contributed: f64,
    pub holdings: Vec<(String, Holding)>,
}

pub fn simulate_multi(
    config: &StrategyConfig,
    plan: &ContributionPlan,
    series: &[(String, Vec<PriceBar>)],
) -> Result<MultiAssetOutcome, ConfigError> {
    let lookup: HashMap<&str, &[PriceBar]> = series
        .iter()
        .map(|(symbol, bars)| (symbol.as_str(), bars.as_slice()))
        .collect();

    let mut books = Vec::with_capacity(config.allocations.len());
    for alloc in &config.allocations {
        let bars = lookup.get(alloc.symbol.as_str()).copied().unwrap_or(&[]);
        if bars.is_empty() {
            return Err(ConfigError::EmptyPriceSeries {
                symbol: alloc.symbol.clone(),
            });
        }
        if !is_strictly_ordered(bars) {
            return Err(ConfigError::UnorderedPriceSeries {
                symbol: alloc.symbol.clone(),
            });
        }
        books.push(AssetBook::new(alloc.symbol.clone(), alloc.ratio, bars));
    }

    let calendar = match books.first() {
        Some(book) => book.bars,
        None => {
            return Err(ConfigError::EmptyPriceSeries {
                symbol: config.symbol.clone(),
            });
        }
    };
    let due = contribution_days(calendar, plan);

    let mut cash = config.initial_capital;
    let mut total_contributed = config.initial_capital;
    let mut trades = Vec::new();
    let mut equity = Vec::with_capacity(calendar.len());

    for (i, day) in calendar.iter().enumerate() {
        let prices: Vec<Option<f64>> = books.iter_mut().map(|b| b.mark(day.date)).collect();

        if due[i] {
            cash += plan.amount;
            total_contributed += plan.amount;

            for (k, price) in prices.iter().enumerate() {
                let Some(price) = *price else { continue };
                let budget = (plan.amount * books[k].ratio).min(cash);
                let shares = affordable_shares(budget, price);
                if shares == 0 {
                    continue;
                }
                let cost = shares as f64 * price;
                cash -= cost;
                books[k].holding.buy(shares, cost);

                let (pct, amount) = books[k].holding.unrealized(price);
                let total_assets = cash + books.iter().map(AssetBook::market_value).sum::<f64>();
                tracing::debug!(
                    date = %day.date,
                    symbol = %books[k].symbol,
                    shares,
                    price,
                    "dca buy"
                );

                trades.push(
                    TradeRecord::new(day.date, TradeAction::Buy, price, shares, cash, total_assets)
                        .with_pnl(pct)
                        .with_pnl_amount(amount)
                        .with_symbol(books[k].symbol.clone()),
                );
            }
        }

        let total = cash + books.iter().map(AssetBook::market_value).sum::<f64>();
        equity.push(EquityPoint::new(day.date, total));
    }

    Ok(MultiAssetOutcome {
        trades,
        equity,
        cash,
        total_contributed,
        holdings: books
            .into_iter()
            .map(|b| (b.symbol, b.holding))
            .collect(),
    })
}
