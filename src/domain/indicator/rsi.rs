//! RSI (Relative Strength Index) indicator.
//!
//! Uses simple rolling means of the last `n` price changes:
//! - gain[i] = max(C[i] - C[i-1], 0), loss[i] = max(C[i-1] - C[i], 0)
//! - avg_gain / avg_loss = mean over the trailing n changes
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (a flat window also reads 100).
//!
//! Warmup: first n bars are invalid (need n price changes).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::price::PriceBar;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut gains: Vec<f64> = Vec::with_capacity(bars.len());
    let mut losses: Vec<f64> = Vec::with_capacity(bars.len());

    for i in 1..bars.len() {
        let change = bars[i].close - bars[i - 1].close;
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        // Bar i has i price changes behind it.
        let valid = period > 0 && i >= period;
        let rsi = if valid {
            let window = i - period..i;
            let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
            let avg_loss = losses[window].iter().sum::<f64>() / period as f64;
            rsi_from_averages(avg_gain, avg_loss)
        } else {
            0.0
        };

        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Simple(rsi),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
