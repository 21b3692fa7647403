//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! No warmup: every bar is valid once the span is non-zero.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::price::PriceBar;

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let raw = ema_of(&closes, period);

    let values = bars
        .iter()
        .zip(raw)
        .map(|(bar, v)| IndicatorPoint {
            date: bar.date,
            valid: period > 0,
            value: IndicatorValue::Simple(v),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA recurrence over an arbitrary series. Returns zeros when `span` is 0.
pub fn ema_of(series: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return vec![0.0; series.len()];
    }

    let k = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(series.len());
    let mut ema = 0.0;

    for (i, &x) in series.iter().enumerate() {
        ema = if i == 0 { x } else { x * k + ema * (1.0 - k) };
        out.push(ema);
    }

    out
}
