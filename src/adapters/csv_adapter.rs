//! CSV file market data adapter.
//!
//! Reads `<base_path>/<SYMBOL>.csv` with a header row. `date` and `close` are
//! required; `open`, `high` and `low` default to `close`, `volume` to 0.

use crate::domain::error::BacktestError;
use crate::domain::price::PriceBar;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn locate_columns(headers: &csv::StringRecord, symbol: &str) -> Result<Columns, BacktestError> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let required = |name: &str| {
        find(name).ok_or_else(|| BacktestError::MarketData {
            symbol: symbol.to_string(),
            reason: format!("missing {} column", name),
        })
    };
    Ok(Columns {
        date: required("date")?,
        open: find("open"),
        high: find("high"),
        low: find("low"),
        close: required("close")?,
        volume: find("volume"),
    })
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    symbol: &str,
) -> Result<T, BacktestError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| BacktestError::MarketData {
        symbol: symbol.to_string(),
        reason: format!("missing {} value", name),
    })?;
    raw.trim().parse().map_err(|e| BacktestError::MarketData {
        symbol: symbol.to_string(),
        reason: format!("invalid {} value '{}': {}", name, raw, e),
    })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| BacktestError::MarketData {
            symbol: symbol.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| BacktestError::MarketData {
            symbol: symbol.to_string(),
            reason: format!("CSV header error: {}", e),
        })?;
        let cols = locate_columns(headers, symbol)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| BacktestError::MarketData {
                symbol: symbol.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(cols.date).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                BacktestError::MarketData {
                    symbol: symbol.to_string(),
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let close: f64 = parse_field(&record, cols.close, "close", symbol)?;
            let optional = |col: Option<usize>, name: &str| -> Result<f64, BacktestError> {
                match col {
                    Some(i) => parse_field(&record, i, name, symbol),
                    None => Ok(close),
                }
            };
            let volume = match cols.volume {
                Some(i) => parse_field(&record, i, "volume", symbol)?,
                None => 0,
            };

            bars.push(PriceBar {
                date,
                open: optional(cols.open, "open")?,
                high: optional(cols.high, "high")?,
                low: optional(cols.low, "low")?,
                close,
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        let before = bars.len();
        bars.dedup_by_key(|b| b.date);
        if bars.len() != before {
            tracing::warn!(symbol, dropped = before - bars.len(), "duplicate dates dropped");
        }
        tracing::debug!(symbol, bars = bars.len(), "loaded price history");
        Ok(bars)
    }
}
