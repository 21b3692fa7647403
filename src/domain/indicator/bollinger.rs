//! Bollinger Bands indicator.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N).
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::price::PriceBar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

pub fn calculate_bollinger(bars: &[PriceBar], period: usize, multiplier: f64) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let valid = period > 0 && i + 1 >= period;

        let (upper, middle, lower) = if valid {
            let window = &bars[i + 1 - period..=i];
            let mean = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|b| (b.close - mean).powi(2))
                .sum::<f64>()
                / period as f64;
            let band = multiplier * variance.sqrt();
            (mean + band, mean, mean - band)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::bollinger(period, multiplier),
        values,
    }
}
