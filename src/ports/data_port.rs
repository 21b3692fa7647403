//! Market data port trait.

use crate::domain::error::BacktestError;
use crate::domain::price::PriceBar;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Daily bars for `symbol` within `[start_date, end_date]`, strictly
    /// increasing by date. An empty vector means no data in range.
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError>;
}
