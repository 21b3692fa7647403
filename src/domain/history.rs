//! Listing and side-by-side comparison of stored results.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BacktestError;
use crate::ports::store_port::StoredResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Warning,
    Danger,
}

impl ResultStatus {
    /// Above 5 % is a success, a non-negative return a warning.
    pub fn classify(total_return: f64) -> Self {
        if total_return > 5.0 {
            ResultStatus::Success
        } else if total_return >= 0.0 {
            ResultStatus::Warning
        } else {
            ResultStatus::Danger
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub id: u64,
    pub name: String,
    pub symbol: String,
    pub strategy_type: String,
    pub period: String,
    pub total_return: f64,
    pub status: ResultStatus,
    pub created_at: NaiveDateTime,
}

impl HistoryItem {
    pub fn from_result(stored: &StoredResult) -> Self {
        let r = &stored.result;
        HistoryItem {
            id: r.id,
            name: r.strategy_name.clone(),
            symbol: r.symbol.clone(),
            strategy_type: r.strategy_type.clone(),
            period: format!("{} ~ {}", r.start_date, r.end_date),
            total_return: r.summary.total_return,
            status: ResultStatus::classify(r.summary.total_return),
            created_at: stored.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub id: u64,
    pub name: String,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquitySeries {
    pub name: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub metrics: Vec<MetricRow>,
    /// Shared x axis, taken from the first result.
    pub dates: Vec<NaiveDate>,
    pub series: Vec<EquitySeries>,
}

pub fn compare(results: &[BacktestResult]) -> Result<Comparison, BacktestError> {
    let first = match results {
        [first, _, ..] => first,
        _ => {
            return Err(BacktestError::TooFewResults {
                count: results.len(),
            });
        }
    };

    Ok(Comparison {
        metrics: results
            .iter()
            .map(|r| MetricRow {
                id: r.id,
                name: r.strategy_name.clone(),
                total_return: r.summary.total_return,
                annualized_return: r.summary.annualized_return,
                sharpe_ratio: r.summary.sharpe_ratio,
                max_drawdown: r.summary.max_drawdown,
                win_rate: r.summary.win_rate,
            })
            .collect(),
        dates: first.equity_data.dates.clone(),
        series: results
            .iter()
            .map(|r| EquitySeries {
                name: r.strategy_name.clone(),
                data: r.equity_data.equity.clone(),
            })
            .collect(),
    })
}
