//! Daily price bar representation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// A bar where every price field equals `close`.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

/// Closing prices in bar order.
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// True when dates are strictly increasing.
pub fn is_strictly_ordered(bars: &[PriceBar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}
