use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::primitives::{MS_PER_MINUTE, date_to_ms, trading_date_of};
use crate::core::{Bar, PaneSide, Regime, Timeframe, ViewState};
use crate::render::Color;

use super::viewer_config::{MAX_SESSION_DAYS, MIN_SESSION_DAYS};

/// Exchange session drawn as a background band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingSession {
    Asia,
    Frankfurt,
    London,
    NewYork,
}

impl TradingSession {
    pub const ALL: [TradingSession; 4] = [
        TradingSession::Asia,
        TradingSession::Frankfurt,
        TradingSession::London,
        TradingSession::NewYork,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Asia => "Asia",
            Self::Frankfurt => "Frankfurt",
            Self::London => "London",
            Self::NewYork => "New York",
        }
    }

    /// `(day offset, minute of day)` of the session start and end, relative to the trading date.
    const fn bounds(self) -> ((i64, i64), (i64, i64)) {
        match self {
            Self::Asia => ((-1, 20 * 60), (0, 60)),
            Self::Frankfurt => ((0, 60 + 45), (0, 2 * 60 + 45)),
            Self::London => ((0, 3 * 60), (0, 7 * 60)),
            Self::NewYork => ((0, 8 * 60), (0, 12 * 60)),
        }
    }

    /// Start and end (exclusive) timestamps of the session on `trading_date`.
    #[must_use]
    pub fn span_ms(self, trading_date: NaiveDate) -> (i64, i64) {
        let day = date_to_ms(trading_date);
        let ((start_day, start_min), (end_day, end_min)) = self.bounds();
        let day_ms = Duration::days(1).num_milliseconds();
        (
            day + start_day * day_ms + start_min * MS_PER_MINUTE,
            day + end_day * day_ms + end_min * MS_PER_MINUTE,
        )
    }

    #[must_use]
    pub fn fill_color(self) -> Color {
        match self {
            Self::Asia => Color::rgba8(77, 208, 225, 0.1),
            Self::Frankfurt => Color::rgba8(255, 152, 0, 0.1),
            Self::London => Color::rgba8(76, 175, 80, 0.1),
            Self::NewYork => Color::rgba8(171, 71, 188, 0.1),
        }
    }
}

/// Polygon following the running high (left to right) then the running low back.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBand {
    pub session: TradingSession,
    pub trading_date: NaiveDate,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy)]
struct DaySpan {
    first_idx: i64,
    last_idx: i64,
}

#[must_use]
pub fn pane_shows_session_bands(timeframe: Timeframe, pane: PaneSide) -> bool {
    timeframe.shows_session_bands() && timeframe.regime(pane) != Regime::Daily
}

/// Picks up to `max_days` trading days, centred on the visible ones.
fn select_days(
    days: &BTreeMap<NaiveDate, DaySpan>,
    visible_start: f64,
    visible_end: f64,
    max_days: usize,
) -> BTreeSet<NaiveDate> {
    let all: Vec<NaiveDate> = days.keys().copied().collect();
    let mut visible = Vec::new();
    let mut full = Vec::new();
    let (mut left_partial, mut right_partial) = (None, None);
    for (date, span) in days {
        let (first, last) = (span.first_idx as f64, span.last_idx as f64);
        if last < visible_start || first > visible_end {
            continue;
        }
        visible.push(*date);
        if first >= visible_start && last <= visible_end {
            full.push(*date);
        } else {
            if first < visible_start {
                left_partial = Some(*date);
            }
            if last > visible_end {
                right_partial = Some(*date);
            }
        }
    }

    if visible.is_empty() {
        let skip = all.len().saturating_sub(max_days);
        return all[skip..].iter().copied().collect();
    }

    if visible.len() >= max_days {
        let mut selected = full;
        for partial in [right_partial, left_partial].into_iter().flatten() {
            if !selected.contains(&partial) {
                selected.push(partial);
            }
        }
        while selected.len() > max_days {
            let Some(pos) = selected.iter().position(|d| Some(*d) != right_partial) else {
                break;
            };
            selected.remove(pos);
        }
        return selected.into_iter().collect();
    }

    let mut selected: VecDeque<NaiveDate> = visible.iter().copied().collect();
    let mut chosen: BTreeSet<NaiveDate> = selected.iter().copied().collect();
    let mut remaining = max_days - selected.len();
    let first_visible = all.iter().position(|d| Some(d) == visible.first());
    let last_visible = all.iter().position(|d| Some(d) == visible.last());
    let (Some(first_visible), Some(last_visible)) = (first_visible, last_visible) else {
        return chosen;
    };
    let mut left = first_visible.checked_sub(1);
    let mut right = last_visible + 1;

    while remaining > 0 && (left.is_some() || right < all.len()) {
        let mut added = false;
        let take_left = remaining > 1 || right >= all.len();
        if take_left {
            if let Some(l) = left.filter(|l| !chosen.contains(&all[*l])) {
                selected.push_front(all[l]);
                chosen.insert(all[l]);
                remaining -= 1;
                added = true;
                left = l.checked_sub(1);
            }
        }
        if remaining > 0 && right < all.len() && !chosen.contains(&all[right]) {
            selected.push_back(all[right]);
            chosen.insert(all[right]);
            remaining -= 1;
            added = true;
            right += 1;
        }
        if !added {
            break;
        }
    }
    chosen
}

/// Session bands for the trading days around the visible range.
///
/// `window_bars` are the materialized bars of the buffered window in index order.
#[must_use]
pub fn build_session_bands(
    timeframe: Timeframe,
    pane: PaneSide,
    state: &ViewState,
    window_bars: &[Bar],
    session_days: u32,
) -> Vec<SessionBand> {
    let mut bands = Vec::new();
    if session_days == 0 || window_bars.is_empty() || !pane_shows_session_bands(timeframe, pane) {
        return bands;
    }
    let Some(max_window_idx) = window_bars.last().map(|bar| bar.i) else {
        return bands;
    };

    let mut days: BTreeMap<NaiveDate, DaySpan> = BTreeMap::new();
    for bar in window_bars {
        let Some(date) = trading_date_of(bar.ts) else {
            continue;
        };
        days.entry(date)
            .and_modify(|span| {
                span.first_idx = span.first_idx.min(bar.i);
                span.last_idx = span.last_idx.max(bar.i);
            })
            .or_insert(DaySpan {
                first_idx: bar.i,
                last_idx: bar.i,
            });
    }

    let max_days = session_days.clamp(MIN_SESSION_DAYS, MAX_SESSION_DAYS) as usize;
    let selected = select_days(&days, state.visible_start_idx, state.visible_end_idx, max_days);

    for trading_date in selected {
        for session in TradingSession::ALL {
            let (start_ms, end_ms) = session.span_ms(trading_date);
            let inside: Vec<&Bar> = window_bars
                .iter()
                .filter(|bar| bar.ts >= start_ms && bar.ts < end_ms)
                .collect();
            let Some(first) = inside.first() else {
                continue;
            };

            let (mut high, mut low) = (first.h, first.l);
            let mut top = Vec::with_capacity(inside.len() + 1);
            let mut bottom = Vec::with_capacity(inside.len() + 1);
            for bar in &inside {
                high = high.max(bar.h);
                low = low.min(bar.l);
                top.push((bar.i as f64, high));
                bottom.push((bar.i as f64, low));
            }
            if let Some(last) = inside.last() {
                let extend = (last.i + 1).min(max_window_idx);
                if extend > last.i {
                    top.push((extend as f64, high));
                    bottom.push((extend as f64, low));
                }
            }
            top.extend(bottom.into_iter().rev());
            bands.push(SessionBand {
                session,
                trading_date,
                points: top,
            });
        }
    }
    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(count: i64) -> BTreeMap<NaiveDate, DaySpan> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        (0..count)
            .map(|d| {
                (
                    base + Duration::days(d),
                    DaySpan {
                        first_idx: d * 10,
                        last_idx: d * 10 + 9,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn expands_around_visible_days_up_to_limit() {
        let days = spans(10);
        let selected = select_days(&days, 40.0, 49.0, 5);
        assert_eq!(selected.len(), 5);
        let first = NaiveDate::from_ymd_opt(2024, 1, 3).expect("date");
        let last = NaiveDate::from_ymd_opt(2024, 1, 7).expect("date");
        assert_eq!(selected.first().copied(), Some(first));
        assert_eq!(selected.last().copied(), Some(last));
    }

    #[test]
    fn many_visible_days_keep_right_partial_day() {
        let days = spans(10);
        let selected = select_days(&days, 5.0, 95.0, 3);
        assert_eq!(selected.len(), 3);
        let right_partial = NaiveDate::from_ymd_opt(2024, 1, 10).expect("date");
        assert!(selected.contains(&right_partial));
    }

    #[test]
    fn nothing_visible_takes_latest_days() {
        let days = spans(10);
        let selected = select_days(&days, 500.0, 600.0, 4);
        let first = NaiveDate::from_ymd_opt(2024, 1, 7).expect("date");
        assert_eq!(selected.first().copied(), Some(first));
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn asia_starts_previous_evening() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("date");
        let (start, end) = TradingSession::Asia.span_ms(date);
        assert_eq!(end - start, 5 * 60 * MS_PER_MINUTE);
        assert_eq!(start, date_to_ms(date) - 4 * 60 * MS_PER_MINUTE);
    }
}
