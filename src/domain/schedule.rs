//! Contribution calendar.
//!
//! Picks at most one contribution bar per period. The same scan drives DCA buy
//! days and the recurring cash injection of directional strategies.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::config::ContributionPlan;
use crate::domain::error::ConfigError;
use crate::domain::price::PriceBar;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interval {
    #[default]
    Monthly,
    Yearly,
}

impl Interval {
    pub fn period_key(self, date: NaiveDate) -> PeriodKey {
        match self {
            Interval::Monthly => PeriodKey::Month {
                year: date.year(),
                month: date.month(),
            },
            Interval::Yearly => PeriodKey::Year { year: date.year() },
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Monthly => write!(f, "MONTHLY"),
            Interval::Yearly => write!(f, "YEARLY"),
        }
    }
}

impl FromStr for Interval {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MONTHLY" => Ok(Interval::Monthly),
            "YEARLY" => Ok(Interval::Yearly),
            other => Err(ConfigError::Invalid {
                section: "contribution".to_string(),
                key: "interval".to_string(),
                reason: format!("expected MONTHLY or YEARLY, got {}", other),
            }),
        }
    }
}

/// Calendar bucket a bar falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKey {
    Month { year: i32, month: u32 },
    Year { year: i32 },
}

/// One flag per bar, `true` on the bar that receives the period's contribution.
///
/// Monthly: the first bar of the month on or after `day_of_month`, else the last
/// bar of that month present in the series.
/// Yearly: the same rule applied to the bars of `month_of_year` only; a year with
/// no bar in that month gets nothing.
pub fn contribution_days(bars: &[PriceBar], plan: &ContributionPlan) -> Vec<bool> {
    let interval = plan.interval;
    let keys: Vec<PeriodKey> = bars.iter().map(|b| interval.period_key(b.date)).collect();
    let in_scope = |bar: &PriceBar| match interval {
        Interval::Monthly => true,
        Interval::Yearly => bar.month() == plan.month_of_year,
    };

    let mut seen: HashSet<PeriodKey> = HashSet::new();
    let mut days = vec![false; bars.len()];

    for (i, bar) in bars.iter().enumerate() {
        if !in_scope(bar) || seen.contains(&keys[i]) {
            continue;
        }

        let last_in_period = match bars.get(i + 1) {
            Some(next) => !in_scope(next) || keys[i + 1] != keys[i],
            None => true,
        };

        if bar.day() >= plan.day_of_month || last_in_period {
            seen.insert(keys[i]);
            days[i] = true;
            tracing::debug!(date = %bar.date, ?interval, "contribution day");
        }
    }

    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str) -> PriceBar {
        PriceBar::from_close(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(), 100.0)
    }

    fn plan(day: u32, month: u32, interval: Interval) -> ContributionPlan {
        ContributionPlan {
            amount: 1000.0,
            day_of_month: day,
            month_of_year: month,
            interval,
        }
    }

    fn selected(bars: &[PriceBar], flags: &[bool]) -> Vec<String> {
        bars.iter()
            .zip(flags)
            .filter(|(_, f)| **f)
            .map(|(b, _)| b.date.to_string())
            .collect()
    }

    #[test]
    fn monthly_first_bar_on_or_after_day() {
        let bars = vec![
            bar("2024-01-02"),
            bar("2024-01-03"),
            bar("2024-01-16"),
            bar("2024-01-17"),
            bar("2024-02-01"),
            bar("2024-02-15"),
        ];
        let flags = contribution_days(&bars, &plan(15, 1, Interval::Monthly));
        assert_eq!(selected(&bars, &flags), vec!["2024-01-16", "2024-02-15"]);
    }

    #[test]
    fn monthly_falls_back_to_last_bar_of_month() {
        let bars = vec![
            bar("2024-02-05"),
            bar("2024-02-27"),
            bar("2024-03-04"),
            bar("2024-03-29"),
            bar("2024-04-01"),
        ];
        let flags = contribution_days(&bars, &plan(30, 1, Interval::Monthly));
        assert_eq!(
            selected(&bars, &flags),
            vec!["2024-02-27", "2024-03-29", "2024-04-01"]
        );
    }

    #[test]
    fn monthly_day_one_picks_first_bar() {
        let bars = vec![bar("2024-01-02"), bar("2024-01-03"), bar("2024-02-01")];
        let flags = contribution_days(&bars, &plan(1, 1, Interval::Monthly));
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn yearly_restricted_to_target_month() {
        let bars = vec![
            bar("2023-02-01"),
            bar("2023-03-01"),
            bar("2023-03-20"),
            bar("2023-04-03"),
            bar("2024-02-01"),
            bar("2024-03-04"),
        ];
        let flags = contribution_days(&bars, &plan(10, 3, Interval::Yearly));
        assert_eq!(selected(&bars, &flags), vec!["2023-03-20", "2024-03-04"]);
    }

    #[test]
    fn yearly_last_bar_of_month_when_day_missed() {
        let bars = vec![bar("2023-06-01"), bar("2023-06-02"), bar("2023-07-03")];
        let flags = contribution_days(&bars, &plan(28, 6, Interval::Yearly));
        assert_eq!(selected(&bars, &flags), vec!["2023-06-02"]);
    }

    #[test]
    fn yearly_without_target_month_gets_nothing() {
        let bars = vec![bar("2023-01-03"), bar("2023-02-01")];
        let flags = contribution_days(&bars, &plan(1, 6, Interval::Yearly));
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn empty_series() {
        assert!(contribution_days(&[], &plan(1, 1, Interval::Monthly)).is_empty());
    }

    #[test]
    fn interval_parse_and_display() {
        assert_eq!("monthly".parse::<Interval>().unwrap(), Interval::Monthly);
        assert_eq!(" YEARLY ".parse::<Interval>().unwrap(), Interval::Yearly);
        assert!("weekly".parse::<Interval>().is_err());
        assert_eq!(Interval::Yearly.to_string(), "YEARLY");
    }

    #[test]
    fn period_keys() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        assert_eq!(
            Interval::Monthly.period_key(date),
            PeriodKey::Month {
                year: 2024,
                month: 5
            }
        );
        assert_eq!(Interval::Yearly.period_key(date), PeriodKey::Year { year: 2024 });
    }
}
