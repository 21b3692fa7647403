//! Per-bar trading signals for each strategy variant.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::config::{ContributionPlan, StrategyKind};
use crate::domain::indicator::{
    IndicatorSet, IndicatorType, calculate_bollinger, calculate_macd, calculate_rsi,
    calculate_sma,
};
use crate::domain::price::PriceBar;
use crate::domain::schedule::contribution_days;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    #[default]
    None,
    Buy,
    Sell,
}

/// BUY where `fast > slow` and the previous bar was not, SELL on the mirror
/// condition. Undefined bars are neither above nor below.
pub fn crossover(fast: &[Option<f64>], slow: &[Option<f64>]) -> Vec<Signal> {
    let n = fast.len().min(slow.len());
    let relation = |i: usize| match (fast[i], slow[i]) {
        (Some(f), Some(s)) => (f > s, f < s),
        _ => (false, false),
    };

    let mut signals = vec![Signal::None; n];
    let mut prev = (false, false);
    for (i, signal) in signals.iter_mut().enumerate() {
        let (above, below) = relation(i);
        if above && !prev.0 {
            *signal = Signal::Buy;
        } else if below && !prev.1 {
            *signal = Signal::Sell;
        }
        prev = (above, below);
    }
    signals
}

/// RSI mean-reversion: BUY on a downward cross of `buy`, SELL on an upward cross of `sell`.
fn threshold_cross(rsi: &[Option<f64>], buy: f64, sell: f64) -> Vec<Signal> {
    let mut signals = vec![Signal::None; rsi.len()];
    for i in 1..rsi.len() {
        if let (Some(prev), Some(curr)) = (rsi[i - 1], rsi[i]) {
            if curr < buy && prev >= buy {
                signals[i] = Signal::Buy;
            } else if curr > sell && prev <= sell {
                signals[i] = Signal::Sell;
            }
        }
    }
    signals
}

fn band_breach(bars: &[PriceBar], bands: &[Option<(f64, f64)>]) -> Vec<Signal> {
    bars.iter()
        .zip(bands)
        .map(|(bar, band)| match band {
            Some((lower, _)) if bar.close < *lower => Signal::Buy,
            Some((_, upper)) if bar.close > *upper => Signal::Sell,
            _ => Signal::None,
        })
        .collect()
}

fn series(indicators: &IndicatorSet, key: &IndicatorType, len: usize) -> Vec<Option<f64>> {
    indicators
        .get(key)
        .map(|s| s.simple_values())
        .unwrap_or_else(|| vec![None; len])
}

impl StrategyKind {
    /// Indicators this strategy reads. DCA needs none.
    pub fn compute_indicators(&self, bars: &[PriceBar]) -> IndicatorSet {
        let mut set = IndicatorSet::new();
        match *self {
            StrategyKind::MaCross {
                short_period,
                long_period,
            } => {
                set.insert(calculate_sma(bars, short_period));
                set.insert(calculate_sma(bars, long_period));
            }
            StrategyKind::Rsi { period, .. } => set.insert(calculate_rsi(bars, period)),
            StrategyKind::Macd { fast, slow, signal } => {
                set.insert(calculate_macd(bars, fast, slow, signal))
            }
            StrategyKind::Bollinger {
                period,
                std_multiplier,
            } => set.insert(calculate_bollinger(bars, period, std_multiplier)),
            StrategyKind::SmaBreakout { period } => set.insert(calculate_sma(bars, period)),
            StrategyKind::Dca => {}
        }
        set
    }

    /// One signal per bar. `plan` is only read by DCA.
    pub fn generate_signals(
        &self,
        bars: &[PriceBar],
        indicators: &IndicatorSet,
        plan: Option<&ContributionPlan>,
    ) -> Vec<Signal> {
        let n = bars.len();
        let signals = match *self {
            StrategyKind::MaCross {
                short_period,
                long_period,
            } => crossover(
                &series(indicators, &IndicatorType::Sma(short_period), n),
                &series(indicators, &IndicatorType::Sma(long_period), n),
            ),
            StrategyKind::Rsi {
                period,
                buy_threshold,
                sell_threshold,
            } => threshold_cross(
                &series(indicators, &IndicatorType::Rsi(period), n),
                buy_threshold,
                sell_threshold,
            ),
            StrategyKind::Macd { fast, slow, signal } => {
                let key = IndicatorType::Macd { fast, slow, signal };
                let pairs = indicators
                    .get(&key)
                    .map(|s| s.macd_values())
                    .unwrap_or_else(|| vec![None; n]);
                let line: Vec<Option<f64>> = pairs.iter().map(|p| p.map(|(l, _)| l)).collect();
                let sig: Vec<Option<f64>> = pairs.iter().map(|p| p.map(|(_, s)| s)).collect();
                crossover(&line, &sig)
            }
            StrategyKind::Bollinger {
                period,
                std_multiplier,
            } => {
                let bands = indicators
                    .get(&IndicatorType::bollinger(period, std_multiplier))
                    .map(|s| s.band_values())
                    .unwrap_or_else(|| vec![None; n]);
                band_breach(bars, &bands)
            }
            StrategyKind::SmaBreakout { period } => {
                let close: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
                crossover(&close, &series(indicators, &IndicatorType::Sma(period), n))
            }
            StrategyKind::Dca => match plan {
                Some(plan) => contribution_days(bars, plan)
                    .into_iter()
                    .map(|due| if due { Signal::Buy } else { Signal::None })
                    .collect(),
                None => vec![Signal::None; n],
            },
        };

        tracing::debug!(
            strategy = self.type_name(),
            bars = n,
            buys = signals.iter().filter(|s| **s == Signal::Buy).count(),
            sells = signals.iter().filter(|s| **s == Signal::Sell).count(),
            "signals generated"
        );
        signals
    }
}

pub const SAMPLE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSample {
    pub date: NaiveDate,
    pub signal: Signal,
    pub close: f64,
}

/// Summary of a signal vector, for inspecting a strategy without simulating it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalStats {
    pub total_days: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub first_signal: Option<NaiveDate>,
    pub last_signal: Option<NaiveDate>,
    pub samples: Vec<SignalSample>,
}

impl SignalStats {
    pub fn collect(bars: &[PriceBar], signals: &[Signal]) -> Self {
        let fired: Vec<(&PriceBar, Signal)> = bars
            .iter()
            .zip(signals.iter().copied())
            .filter(|(_, s)| *s != Signal::None)
            .collect();

        SignalStats {
            total_days: bars.len(),
            buy_signals: fired.iter().filter(|(_, s)| *s == Signal::Buy).count(),
            sell_signals: fired.iter().filter(|(_, s)| *s == Signal::Sell).count(),
            first_signal: fired.first().map(|(b, _)| b.date),
            last_signal: fired.last().map(|(b, _)| b.date),
            samples: fired
                .iter()
                .take(SAMPLE_LIMIT)
                .map(|(b, s)| SignalSample {
                    date: b.date,
                    signal: *s,
                    close: b.close,
                })
                .collect(),
        }
    }
}
