//! Trade ledger entries and equity curve points.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maps NaN and ±∞ to 0.0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub price: f64,
    pub shares: u64,
    pub value: f64,
    pub fee: f64,
    pub tax: f64,
    pub cash_balance: f64,
    pub total_assets: f64,
    pub pnl: Option<f64>,
    pub pnl_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl TradeRecord {
    /// Builds a record with every numeric field scrubbed of NaN/∞.
    /// `value` is `price × shares`; fee and tax are always zero.
    pub fn new(
        date: NaiveDate,
        action: TradeAction,
        price: f64,
        shares: u64,
        cash_balance: f64,
        total_assets: f64,
    ) -> Self {
        TradeRecord {
            date,
            action,
            price: finite_or_zero(price),
            shares,
            value: finite_or_zero(price * shares as f64),
            fee: 0.0,
            tax: 0.0,
            cash_balance: finite_or_zero(cash_balance),
            total_assets: finite_or_zero(total_assets),
            pnl: None,
            pnl_amount: None,
            symbol: None,
        }
    }

    pub fn with_pnl(mut self, pnl: f64) -> Self {
        self.pnl = Some(finite_or_zero(pnl));
        self
    }

    pub fn with_pnl_amount(mut self, amount: f64) -> Self {
        self.pnl_amount = Some(finite_or_zero(amount));
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn is_buy(&self) -> bool {
        self.action == TradeAction::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.action == TradeAction::Sell
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub total_assets: f64,
}

impl EquityPoint {
    pub fn new(date: NaiveDate, total_assets: f64) -> Self {
        EquityPoint {
            date,
            total_assets: finite_or_zero(total_assets),
        }
    }
}

/// Sum of `value` over BUY records.
pub fn total_bought(trades: &[TradeRecord]) -> f64 {
    trades.iter().filter(|t| t.is_buy()).map(|t| t.value).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    #[test]
    fn finite_or_zero_scrubs() {
        assert_eq!(finite_or_zero(1.5), 1.5);
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn record_value_and_zero_costs() {
        let t = TradeRecord::new(date(), TradeAction::Buy, 100.0, 10, 0.0, 1000.0);
        assert!((t.value - 1000.0).abs() < f64::EPSILON);
        assert_eq!(t.fee, 0.0);
        assert_eq!(t.tax, 0.0);
        assert!(t.pnl.is_none());
        assert!(t.symbol.is_none());
    }

    #[test]
    fn builders_scrub_non_finite() {
        let t = TradeRecord::new(date(), TradeAction::Hold, f64::NAN, 1, f64::INFINITY, 5.0)
            .with_pnl(f64::NAN)
            .with_pnl_amount(f64::NEG_INFINITY)
            .with_symbol("VOO");
        assert_eq!(t.price, 0.0);
        assert_eq!(t.cash_balance, 0.0);
        assert_eq!(t.pnl, Some(0.0));
        assert_eq!(t.pnl_amount, Some(0.0));
        assert_eq!(t.symbol.as_deref(), Some("VOO"));
    }

    #[test]
    fn action_serializes_uppercase() {
        let json = serde_json::to_string(&TradeAction::Hold).unwrap();
        assert_eq!(json, "\"HOLD\"");
    }

    #[test]
    fn total_bought_ignores_sells() {
        let trades = vec![
            TradeRecord::new(date(), TradeAction::Buy, 10.0, 5, 0.0, 0.0),
            TradeRecord::new(date(), TradeAction::Sell, 20.0, 5, 0.0, 0.0),
            TradeRecord::new(date(), TradeAction::Buy, 10.0, 1, 0.0, 0.0),
        ];
        assert!((total_bought(&trades) - 60.0).abs() < f64::EPSILON);
    }
}
