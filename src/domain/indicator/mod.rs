//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values, aligned with the input bars
//! - `IndicatorSet`: The indicators one strategy needs, keyed by `IndicatorType`

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        multiplier_bits: u64,
    },
}

impl IndicatorType {
    /// Bollinger key holding the exact bit pattern of `multiplier`.
    pub fn bollinger(period: usize, multiplier: f64) -> Self {
        IndicatorType::Bollinger {
            period,
            multiplier_bits: multiplier.to_bits(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// `Some(v)` for valid `Simple` points, `None` for warmup bars.
    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| match (p.valid, &p.value) {
                (true, IndicatorValue::Simple(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// `(line, signal)` pairs of a MACD series, `None` where invalid.
    pub fn macd_values(&self) -> Vec<Option<(f64, f64)>> {
        self.values
            .iter()
            .map(|p| match (p.valid, &p.value) {
                (true, IndicatorValue::Macd { line, signal, .. }) => Some((*line, *signal)),
                _ => None,
            })
            .collect()
    }

    /// `(lower, upper)` band pairs of a Bollinger series, `None` where invalid.
    pub fn band_values(&self) -> Vec<Option<(f64, f64)>> {
        self.values
            .iter()
            .map(|p| match (p.valid, &p.value) {
                (true, IndicatorValue::Bollinger { lower, upper, .. }) => Some((*lower, *upper)),
                _ => None,
            })
            .collect()
    }
}

/// Indicators computed for one strategy run.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    series: HashMap<IndicatorType, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: IndicatorSeries) {
        self.series.insert(series.indicator_type.clone(), series);
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.get(indicator_type)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                multiplier_bits,
            } => write!(f, "BOLLINGER({},{})", period, f64::from_bits(*multiplier_bits)),
        }
    }
}
