use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::core::primitives::{
    MS_PER_DAY, MS_PER_MINUTE, add_months_first_day, date_of, date_to_ms,
};

/// Intraday grid steps in minutes, finest first.
pub const INTRADAY_STEPS_MINUTES: [i64; 7] = [15, 30, 60, 120, 240, 480, 720];

/// Hierarchy level of an axis label; higher levels are coarser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelUnit {
    Time,
    Day,
    Month,
    Year,
}

/// Spacing scheme chosen for a time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickGranularity {
    Intraday { step_minutes: i64 },
    /// Every trading day, used when bars are daily.
    DayAll,
    Day,
    /// Mondays, Wednesdays and Fridays.
    DayMwf,
    WeekMon,
    Month,
    Quarter,
    Year,
}

impl TickGranularity {
    /// Calendar candidates from finest to coarsest.
    #[must_use]
    pub fn calendar_ladder(daily_base: bool) -> SmallVec<[TickGranularity; 6]> {
        let finest = if daily_base { Self::DayAll } else { Self::Day };
        smallvec![
            finest,
            Self::DayMwf,
            Self::WeekMon,
            Self::Month,
            Self::Quarter,
            Self::Year
        ]
    }

    #[must_use]
    pub fn code(self) -> String {
        match self {
            Self::Intraday { step_minutes } if step_minutes % 60 == 0 => {
                format!("{}h", step_minutes / 60)
            }
            Self::Intraday { step_minutes } => format!("{step_minutes}min"),
            Self::DayAll => "day_all".to_owned(),
            Self::Day => "day".to_owned(),
            Self::DayMwf => "day_mwf".to_owned(),
            Self::WeekMon => "week_mon".to_owned(),
            Self::Month => "month".to_owned(),
            Self::Quarter => "quarter".to_owned(),
            Self::Year => "year".to_owned(),
        }
    }

    /// Label level that this granularity labels by default.
    #[must_use]
    pub fn base_unit(self) -> LabelUnit {
        match self {
            Self::Intraday { .. } => LabelUnit::Time,
            Self::DayAll | Self::Day | Self::DayMwf | Self::WeekMon => LabelUnit::Day,
            Self::Month | Self::Quarter => LabelUnit::Month,
            Self::Year => LabelUnit::Year,
        }
    }

    #[must_use]
    pub fn is_intraday(self) -> bool {
        matches!(self, Self::Intraday { .. })
    }

    /// Day-level grids receive extra month-boundary ticks.
    #[must_use]
    pub fn injects_month_anchors(self) -> bool {
        matches!(self, Self::DayAll | Self::Day | Self::DayMwf | Self::WeekMon)
    }
}

/// Regular grid from midnight of the day before `start` through `end + step`.
#[must_use]
pub fn intraday_candidates(start_ts: i64, end_ts: i64, step_minutes: i64) -> Vec<i64> {
    let Some(start_date) = date_of(start_ts) else {
        return Vec::new();
    };
    if step_minutes <= 0 || end_ts < start_ts {
        return Vec::new();
    }
    let step = step_minutes * MS_PER_MINUTE;
    let end = end_ts + step;
    let mut t = date_to_ms(start_date) - MS_PER_DAY;
    let mut out = Vec::with_capacity(((end - t) / step + 1).max(0) as usize);
    while t <= end {
        out.push(t);
        t += step;
    }
    out
}

fn step_days(from: NaiveDate, to: NaiveDate, days: i64, keep: impl Fn(NaiveDate) -> bool) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut dt = from;
    while dt <= to {
        if keep(dt) {
            out.push(dt);
        }
        match dt.checked_add_signed(Duration::days(days)) {
            Some(next) => dt = next,
            None => break,
        }
    }
    out
}

fn step_months(from: Option<NaiveDate>, to: Option<NaiveDate>, months: i32) -> Vec<NaiveDate> {
    let (Some(mut dt), Some(to)) = (from, to) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    while dt <= to {
        out.push(dt);
        match add_months_first_day(dt, months) {
            Some(next) => dt = next,
            None => break,
        }
    }
    out
}

/// Calendar-aligned candidate timestamps (midnights) around `[start_ts, end_ts]`.
///
/// Results are unique, ascending and limited to two days beyond either end.
#[must_use]
pub fn calendar_candidates(start_ts: i64, end_ts: i64, granularity: TickGranularity) -> Vec<i64> {
    let (Some(s), Some(e)) = (date_of(start_ts), date_of(end_ts)) else {
        return Vec::new();
    };
    let day = Duration::days(1);

    let dates = match granularity {
        TickGranularity::Year => step_months(
            NaiveDate::from_ymd_opt(s.year() - 1, 1, 1),
            add_months_first_day(e, 12),
            12,
        ),
        TickGranularity::Quarter => {
            let q_month = 3 * (s.month0() / 3) + 1;
            step_months(
                NaiveDate::from_ymd_opt(s.year(), q_month, 1)
                    .and_then(|d| add_months_first_day(d, -3)),
                add_months_first_day(e, 3),
                3,
            )
        }
        TickGranularity::Month => step_months(
            add_months_first_day(s, -1),
            add_months_first_day(e, 1),
            1,
        ),
        TickGranularity::WeekMon => {
            let shift = i64::from(s.weekday().num_days_from_monday()) + 7;
            step_days(s - Duration::days(shift), e + Duration::days(7), 7, |d| {
                d.weekday() == Weekday::Mon
            })
        }
        TickGranularity::DayMwf => step_days(s - day, e + day, 1, |d| {
            matches!(d.weekday(), Weekday::Mon | Weekday::Wed | Weekday::Fri)
        }),
        TickGranularity::Day | TickGranularity::DayAll | TickGranularity::Intraday { .. } => {
            step_days(s - day, e + day, 1, |_| true)
        }
    };

    let min_allowed = date_to_ms(s) - 2 * MS_PER_DAY;
    let max_allowed = date_to_ms(e) + 2 * MS_PER_DAY;
    let mut out: Vec<i64> = dates
        .into_iter()
        .map(date_to_ms)
        .filter(|ms| (min_allowed..=max_allowed).contains(ms))
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::primitives::parse_display_time;

    fn ts(text: &str) -> i64 {
        parse_display_time(text).expect("ts")
    }

    #[test]
    fn intraday_grid_starts_the_day_before() {
        let ticks = intraday_candidates(ts("2024-03-05T09:00"), ts("2024-03-05T10:00"), 720);
        assert_eq!(ticks.first().copied(), Some(ts("2024-03-04T00:00")));
        assert_eq!(ticks.last().copied(), Some(ts("2024-03-05T12:00")));
    }

    #[test]
    fn week_grid_only_holds_mondays() {
        let ticks = calendar_candidates(
            ts("2024-03-06T00:00"),
            ts("2024-03-27T00:00"),
            TickGranularity::WeekMon,
        );
        assert!(!ticks.is_empty());
        for t in ticks {
            let date = date_of(t).expect("date");
            assert_eq!(date.weekday(), Weekday::Mon);
        }
    }

    #[test]
    fn month_grid_is_clipped_to_range() {
        let ticks = calendar_candidates(
            ts("2024-01-15T00:00"),
            ts("2024-04-15T00:00"),
            TickGranularity::Month,
        );
        let expected: Vec<i64> = ["2024-02-01", "2024-03-01", "2024-04-01"]
            .iter()
            .map(|d| ts(&format!("{d}T00:00")))
            .collect();
        assert_eq!(ticks, expected);
    }

    #[test]
    fn granularity_codes() {
        assert_eq!(TickGranularity::Intraday { step_minutes: 30 }.code(), "30min");
        assert_eq!(TickGranularity::Intraday { step_minutes: 120 }.code(), "2h");
        assert_eq!(TickGranularity::WeekMon.base_unit(), LabelUnit::Day);
        assert!(LabelUnit::Year > LabelUnit::Month);
    }
}
