//! Single-asset portfolio simulation.
//!
//! One pass over the bars, in order per bar:
//! 1. recurring contribution (directional strategies with a plan)
//! 2. strategy execution: DCA buys with the injected amount, directional
//!    strategies buy with all cash or sell `sell_ratio` of the holding
//! 3. equity point `cash + shares × close`
//!
//! After the last bar open DCA positions get a HOLD record and directional
//! positions are liquidated at the last close.

use crate::domain::config::{ContributionPlan, StrategyConfig};
use crate::domain::error::ConfigError;
use crate::domain::portfolio::SimulationState;
use crate::domain::price::PriceBar;
use crate::domain::schedule::contribution_days;
use crate::domain::signal::Signal;
use crate::domain::trade::{EquityPoint, TradeAction, TradeRecord, total_bought};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub trades: Vec<TradeRecord>,
    pub equity: Vec<EquityPoint>,
    pub state: SimulationState,
}

impl SimulationOutcome {
    pub fn final_equity(&self) -> f64 {
        self.equity.last().map(|p| p.total_assets).unwrap_or(0.0)
    }
}

pub fn simulate(
    config: &StrategyConfig,
    bars: &[PriceBar],
    signals: &[Signal],
) -> Result<SimulationOutcome, ConfigError> {
    let last = bars.last().ok_or_else(|| ConfigError::EmptyPriceSeries {
        symbol: config.symbol.clone(),
    })?;

    let dca = config.kind.is_dca();
    let plan = config.contribution.as_ref();
    let injections = match plan {
        Some(plan) if !dca => contribution_days(bars, plan),
        _ => vec![false; bars.len()],
    };
    let sell_ratio = config.effective_sell_ratio();

    let mut state = SimulationState::new(config.initial_capital);
    let mut trades = Vec::new();
    let mut equity = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let signal = signals.get(i).copied().unwrap_or_default();

        if let (true, Some(plan)) = (injections[i], plan) {
            state.contribute(plan.amount);
        }

        if dca {
            if let (Signal::Buy, Some(plan)) = (signal, plan) {
                if let Some(trade) = dca_buy(&mut state, bar, plan) {
                    trades.push(trade);
                }
            }
        } else {
            let trade = match signal {
                Signal::Buy => directional_buy(&mut state, bar),
                Signal::Sell if !state.holding.is_flat() => {
                    directional_sell(&mut state, bar, sell_ratio)
                }
                _ => None,
            };
            trades.extend(trade);
        }

        equity.push(EquityPoint::new(bar.date, state.total_assets(bar.close)));
    }

    if !state.holding.is_flat() {
        if dca {
            trades.push(hold_settlement(&state, last, total_bought(&trades)));
        } else if let Some(trade) = directional_sell(&mut state, last, 1.0) {
            tracing::debug!(date = %last.date, shares = trade.shares, "forced liquidation");
            trades.push(trade);
            if let Some(point) = equity.last_mut() {
                *point = EquityPoint::new(last.date, state.cash);
            }
        }
    }

    Ok(SimulationOutcome {
        trades,
        equity,
        state,
    })
}

fn dca_buy(
    state: &mut SimulationState,
    bar: &PriceBar,
    plan: &ContributionPlan,
) -> Option<TradeRecord> {
    state.contribute(plan.amount);
    let (shares, _) = state.buy_with(plan.amount, bar.close)?;
    let (pct, amount) = state.holding.unrealized(bar.close);
    tracing::debug!(date = %bar.date, shares, price = bar.close, "dca buy");

    Some(
        TradeRecord::new(
            bar.date,
            TradeAction::Buy,
            bar.close,
            shares,
            state.cash,
            state.total_assets(bar.close),
        )
        .with_pnl(pct)
        .with_pnl_amount(amount),
    )
}

fn directional_buy(state: &mut SimulationState, bar: &PriceBar) -> Option<TradeRecord> {
    let (shares, _) = state.buy_with(f64::INFINITY, bar.close)?;
    tracing::debug!(date = %bar.date, shares, price = bar.close, "buy");

    Some(TradeRecord::new(
        bar.date,
        TradeAction::Buy,
        bar.close,
        shares,
        state.cash,
        state.total_assets(bar.close),
    ))
}

fn directional_sell(
    state: &mut SimulationState,
    bar: &PriceBar,
    ratio: f64,
) -> Option<TradeRecord> {
    let (sold, _, pnl) = state.sell_fraction(ratio, bar.close)?;
    tracing::debug!(date = %bar.date, shares = sold, price = bar.close, pnl, "sell");

    Some(
        TradeRecord::new(
            bar.date,
            TradeAction::Sell,
            bar.close,
            sold,
            state.cash,
            state.total_assets(bar.close),
        )
        .with_pnl(pnl),
    )
}

/// Final unrealized performance of a DCA run against the money spent on BUYs.
fn hold_settlement(state: &SimulationState, last: &PriceBar, spent: f64) -> TradeRecord {
    let final_equity = state.total_assets(last.close);
    let (pct, amount) = if spent > 0.0 {
        let amount = final_equity - spent;
        (amount / spent * 100.0, amount)
    } else {
        (0.0, 0.0)
    };

    TradeRecord::new(
        last.date,
        TradeAction::Hold,
        last.close,
        state.holding.shares,
        state.cash,
        final_equity,
    )
    .with_pnl(pct)
    .with_pnl_amount(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::StrategyKind;
    use crate::domain::schedule::Interval;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                PriceBar::from_close(start + chrono::Duration::days(i as i64), close)
            })
            .collect()
    }

    fn directional(capital: f64) -> StrategyConfig {
        StrategyConfig {
            name: "sim".into(),
            symbol: "TEST".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            initial_capital: capital,
            sell_ratio: 1.0,
            kind: StrategyKind::SmaBreakout { period: 5 },
            contribution: None,
            allocations: Vec::new(),
        }
    }

    fn dca(capital: f64, amount: f64) -> StrategyConfig {
        StrategyConfig {
            kind: StrategyKind::Dca,
            contribution: Some(ContributionPlan {
                amount,
                day_of_month: 1,
                month_of_year: 1,
                interval: Interval::Monthly,
            }),
            ..directional(capital)
        }
    }

    fn signals_at(n: usize, at: &[(usize, Signal)]) -> Vec<Signal> {
        let mut signals = vec![Signal::None; n];
        for &(i, s) in at {
            signals[i] = s;
        }
        signals
    }

    #[test]
    fn empty_bars_rejected() {
        let err = simulate(&directional(1000.0), &[], &[]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::EmptyPriceSeries {
                symbol: "TEST".into()
            }
        );
    }

    #[test]
    fn buy_spends_all_cash_then_liquidates() {
        let bars = make_bars(&[100.0, 110.0, 120.0]);
        let signals = signals_at(3, &[(0, Signal::Buy)]);
        let out = simulate(&directional(1050.0), &bars, &signals).unwrap();

        assert_eq!(out.trades.len(), 2);
        assert_eq!(out.trades[0].action, TradeAction::Buy);
        assert_eq!(out.trades[0].shares, 10);
        assert!(out.trades[0].pnl.is_none());

        let sell = &out.trades[1];
        assert_eq!(sell.action, TradeAction::Sell);
        assert_eq!(sell.shares, 10);
        assert!((sell.pnl.unwrap() - 200.0).abs() < 1e-9);

        assert_eq!(out.equity.len(), 3);
        assert!((out.final_equity() - 1250.0).abs() < 1e-9);
        assert!(out.state.holding.is_flat());
    }

    #[test]
    fn equity_marks_to_close() {
        let bars = make_bars(&[100.0, 90.0, 95.0]);
        let signals = signals_at(3, &[(0, Signal::Buy), (2, Signal::Sell)]);
        let out = simulate(&directional(1000.0), &bars, &signals).unwrap();

        let equity: Vec<f64> = out.equity.iter().map(|p| p.total_assets).collect();
        assert_eq!(equity, vec![1000.0, 900.0, 950.0]);
    }

    #[test]
    fn sell_ratio_half() {
        let bars = make_bars(&[100.0, 100.0, 100.0]);
        let mut config = directional(10_000.0);
        config.sell_ratio = 0.5;
        let signals = signals_at(3, &[(0, Signal::Buy), (1, Signal::Sell)]);
        let out = simulate(&config, &bars, &signals).unwrap();

        assert_eq!(out.trades[1].action, TradeAction::Sell);
        assert_eq!(out.trades[1].shares, 50);
        // liquidation of the remaining half
        assert_eq!(out.trades[2].shares, 50);
    }

    #[test]
    fn sell_when_flat_is_ignored() {
        let bars = make_bars(&[100.0, 100.0]);
        let signals = signals_at(2, &[(0, Signal::Sell)]);
        let out = simulate(&directional(1000.0), &bars, &signals).unwrap();
        assert!(out.trades.is_empty());
    }

    #[test]
    fn repeated_buys_accumulate() {
        let bars = make_bars(&[100.0, 50.0, 50.0]);
        let mut config = directional(1000.0);
        config.contribution = Some(ContributionPlan {
            amount: 500.0,
            day_of_month: 2,
            month_of_year: 1,
            interval: Interval::Monthly,
        });
        let signals = signals_at(3, &[(0, Signal::Buy), (1, Signal::Buy)]);
        let out = simulate(&config, &bars, &signals).unwrap();

        assert_eq!(out.trades[0].shares, 10);
        assert_eq!(out.trades[1].shares, 10);
        assert!((out.state.total_contributed - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_price_skips_buy() {
        let bars = make_bars(&[0.0, 10.0]);
        let signals = signals_at(2, &[(0, Signal::Buy)]);
        let out = simulate(&directional(100.0), &bars, &signals).unwrap();
        assert!(out.trades.is_empty());
        assert!((out.final_equity() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dca_two_months_constant_price() {
        let bars = make_bars(&[100.0; 60]);
        let config = dca(0.0, 1000.0);
        let signals = signals_at(60, &[(0, Signal::Buy), (31, Signal::Buy)]);
        let out = simulate(&config, &bars, &signals).unwrap();

        let buys: Vec<&TradeRecord> = out.trades.iter().filter(|t| t.is_buy()).collect();
        assert_eq!(buys.len(), 2);
        assert!(buys.iter().all(|t| t.shares == 10));
        assert_eq!(buys[0].pnl, Some(0.0));

        let hold = out.trades.last().unwrap();
        assert_eq!(hold.action, TradeAction::Hold);
        assert_eq!(hold.shares, 20);
        assert_eq!(hold.pnl, Some(0.0));
        assert!((out.state.total_contributed - 2000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dca_never_sells() {
        let bars = make_bars(&[100.0, 120.0]);
        let signals = signals_at(2, &[(0, Signal::Buy), (1, Signal::Sell)]);
        let out = simulate(&dca(0.0, 500.0), &bars, &signals).unwrap();
        assert!(out.trades.iter().all(|t| t.action != TradeAction::Sell));
        assert!((out.final_equity() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn dca_unrealized_pnl_on_buy() {
        let bars = make_bars(&[100.0, 200.0]);
        let signals = signals_at(2, &[(0, Signal::Buy), (1, Signal::Buy)]);
        let out = simulate(&dca(0.0, 1000.0), &bars, &signals).unwrap();

        // 10 @ 100 + 5 @ 200 = 2000 cost, worth 3000
        let second = &out.trades[1];
        assert!((second.pnl.unwrap() - 50.0).abs() < 1e-9);
        assert!((second.pnl_amount.unwrap() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn contribution_injected_for_directional() {
        let bars = make_bars(&[10.0; 40]);
        let mut config = directional(0.0);
        config.contribution = Some(ContributionPlan {
            amount: 100.0,
            day_of_month: 1,
            month_of_year: 1,
            interval: Interval::Monthly,
        });
        let out = simulate(&config, &bars, &vec![Signal::None; 40]).unwrap();
        assert!((out.state.total_contributed - 200.0).abs() < f64::EPSILON);
        assert!((out.final_equity() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_signal_vector_treated_as_none() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let out = simulate(&directional(100.0), &bars, &[Signal::None]).unwrap();
        assert_eq!(out.equity.len(), 3);
        assert!(out.trades.is_empty());
    }
}
