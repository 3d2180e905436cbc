use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::primitives::{MS_PER_DAY, MS_PER_MINUTE, date_of, date_to_ms};
use crate::core::time_ticks::{INTRADAY_STEPS_MINUTES, calendar_candidates, intraday_candidates};
use crate::core::{LabelUnit, TickGranularity, Timeframe, TimeframeSeries, ViewState};

use super::axis_label_format::{LabelContext, format_tick_labels};

pub(super) const AXIS_TIME_TARGET_SPACING_PX: f64 = 72.0;
pub(super) const AXIS_LABEL_COLLISION_RADIUS_PX: f64 = 40.0;
pub(super) const AXIS_TIME_DEFAULT_MAX_TICKS: usize = 32;
const MINUTES_PER_DAY: f64 = 1_440.0;

/// Tuning of the time-axis tick generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeTickTuning {
    pub target_spacing_px: f64,
    pub collision_radius_px: f64,
    pub default_max_ticks: usize,
    /// Median bar steps below this many hours are treated as intraday data.
    pub intraday_threshold_hours: f64,
    /// Intraday views spanning at least this many days switch to calendar ticks.
    pub calendar_preference_days: f64,
    /// Timeframes always labelled with a daily calendar grid.
    pub calendar_forced: Vec<Timeframe>,
}

impl Default for TimeTickTuning {
    fn default() -> Self {
        Self {
            target_spacing_px: AXIS_TIME_TARGET_SPACING_PX,
            collision_radius_px: AXIS_LABEL_COLLISION_RADIUS_PX,
            default_max_ticks: AXIS_TIME_DEFAULT_MAX_TICKS,
            intraday_threshold_hours: 20.0,
            calendar_preference_days: 20.0,
            calendar_forced: vec![Timeframe::H4],
        }
    }
}

/// One labelled tick on the time axis. An empty label means hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisTick {
    pub index: i64,
    pub ts: i64,
    pub label: String,
    pub unit: LabelUnit,
    pub emphasized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTicks {
    pub ticks: Vec<AxisTick>,
    /// Indices whose label was blanked by a coarser neighbour.
    pub hidden: Vec<i64>,
    pub granularity: Option<TickGranularity>,
    /// Tick budget the granularity was chosen against.
    pub max_ticks: usize,
}

impl TimeTicks {
    #[must_use]
    pub fn tick_values(&self) -> Vec<i64> {
        self.ticks.iter().map(|tick| tick.index).collect()
    }

    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.ticks.iter().map(|tick| tick.label.as_str()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Bars of the buffered window as parallel timestamp/index arrays.
struct WindowSamples {
    ts: Vec<i64>,
    idx: Vec<i64>,
}

impl WindowSamples {
    fn collect(series: &TimeframeSeries, state: &ViewState) -> Self {
        let bars = if state.is_empty() {
            series.bars()
        } else {
            let slice = series.slice_for_range(state.window_start as f64, state.window_end as f64);
            if slice.is_empty() { series.bars() } else { slice }
        };
        Self {
            ts: bars.iter().map(|bar| bar.ts).collect(),
            idx: bars.iter().map(|bar| bar.i).collect(),
        }
    }

    /// Maps candidate times onto the first bar at or after them.
    ///
    /// Bars more than one index outside `visible` and repeats of the previous
    /// index are skipped, so the result is strictly increasing.
    fn project(&self, candidates: &[i64], visible: Option<(f64, f64)>, mapped: bool) -> (Vec<i64>, Vec<i64>) {
        let mut values = Vec::new();
        let mut times = Vec::new();
        for &candidate in candidates {
            let pos = self.ts.partition_point(|&ts| ts < candidate);
            let Some(&bar_idx) = self.idx.get(pos) else {
                continue;
            };
            if let Some((start, end)) = visible {
                let idx = bar_idx as f64;
                if idx < start - 1.0 || idx > end + 1.0 {
                    continue;
                }
            }
            if values.last() == Some(&bar_idx) {
                continue;
            }
            values.push(bar_idx);
            times.push(if mapped { self.ts[pos] } else { candidate });
        }
        (values, times)
    }
}

fn median_step_minutes(times: &[i64]) -> Option<f64> {
    let mut diffs: Vec<OrderedFloat<f64>> = times
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 / MS_PER_MINUTE as f64)
        .filter(|dt| *dt > 0.0)
        .map(OrderedFloat)
        .collect();
    if diffs.is_empty() {
        return None;
    }
    diffs.sort_unstable();
    let mid = diffs.len() / 2;
    Some(if diffs.len() % 2 == 0 {
        0.5 * (diffs[mid - 1].0 + diffs[mid].0)
    } else {
        diffs[mid].0
    })
}

fn max_ticks_for_width(state: &ViewState, chart_width_px: Option<f64>, tuning: &TimeTickTuning) -> usize {
    let Some(width) = chart_width_px.filter(|w| w.is_finite() && *w > 0.0) else {
        return tuning.default_max_ticks;
    };
    let mut effective = width;
    if !state.is_empty() {
        let (view_start, view_end) = state.view_range();
        let view_span = (view_end - view_start).abs();
        let data_span = (state.visible_end_idx - state.visible_start_idx).max(0.0);
        if view_span > 0.0 {
            effective = width * (data_span / view_span).clamp(0.05, 1.0);
        }
    }
    let spacing = if tuning.target_spacing_px > 0.0 {
        tuning.target_spacing_px
    } else {
        AXIS_TIME_TARGET_SPACING_PX
    };
    ((effective / spacing).floor() as usize).max(2)
}

/// Chooses tick positions and hierarchical labels for the time axis of one pane.
///
/// Ticks are bar indices inside the buffered window, strictly increasing.
/// The granularity is the densest one whose visible tick count fits the budget
/// derived from `chart_width_px` (or the default budget when unknown).
#[must_use]
pub fn compute_time_ticks(
    series: &TimeframeSeries,
    state: &ViewState,
    chart_width_px: Option<f64>,
    tuning: &TimeTickTuning,
) -> TimeTicks {
    if series.is_empty() {
        return TimeTicks::default();
    }
    let samples = WindowSamples::collect(series, state);
    if samples.ts.is_empty() {
        return TimeTicks::default();
    }

    let visible = (!state.is_empty()).then_some((state.visible_start_idx, state.visible_end_idx));
    let mut vis_times: Vec<i64> = match visible {
        Some((start, end)) => samples
            .idx
            .iter()
            .zip(&samples.ts)
            .filter(|(idx, _)| (**idx as f64) >= start && (**idx as f64) <= end)
            .map(|(_, ts)| *ts)
            .collect(),
        None => Vec::new(),
    };
    if vis_times.is_empty() {
        vis_times = samples.ts.clone();
    }
    let (Some(&start_ts), Some(&end_ts)) = (vis_times.first(), vis_times.last()) else {
        return TimeTicks::default();
    };

    let real_span_minutes = (((end_ts - start_ts) as f64 / MS_PER_MINUTE as f64).round()).max(1.0);
    let median_step = median_step_minutes(&vis_times).unwrap_or(real_span_minutes);

    let mut is_intraday = median_step < tuning.intraday_threshold_hours * 60.0;
    let mut daily_base =
        !is_intraday && (0.5 * MINUTES_PER_DAY..=1.5 * MINUTES_PER_DAY).contains(&median_step);
    if tuning.calendar_forced.contains(&series.timeframe()) {
        is_intraday = false;
        daily_base = true;
    }
    let logical_span_days = median_step * (vis_times.len() - 1) as f64 / MINUTES_PER_DAY;
    let prefer_calendar = is_intraday && logical_span_days >= tuning.calendar_preference_days;

    let max_ticks = max_ticks_for_width(state, chart_width_px, tuning);

    let mut chosen: Option<(TickGranularity, Vec<i64>)> = None;
    if is_intraday && !prefer_calendar {
        let mut best: Option<(usize, TickGranularity, Vec<i64>)> = None;
        for step_minutes in INTRADAY_STEPS_MINUTES {
            let candidates = intraday_candidates(start_ts, end_ts, step_minutes);
            if candidates.is_empty() {
                continue;
            }
            let count = samples.project(&candidates, visible, false).0.len();
            if count > 0
                && count <= max_ticks
                && best.as_ref().is_none_or(|(best_count, _, _)| count > *best_count)
            {
                best = Some((count, TickGranularity::Intraday { step_minutes }, candidates));
            }
        }
        chosen = best.map(|(_, granularity, candidates)| (granularity, candidates));
    }

    if chosen.is_none() {
        let mut best: Option<(usize, TickGranularity, Vec<i64>)> = None;
        let mut fallback: Option<(TickGranularity, Vec<i64>)> = None;
        for granularity in TickGranularity::calendar_ladder(daily_base) {
            let candidates = calendar_candidates(start_ts, end_ts, granularity);
            if candidates.is_empty() {
                continue;
            }
            let count = samples.project(&candidates, visible, false).0.len();
            if count == 0 {
                continue;
            }
            if count <= max_ticks
                && best.as_ref().is_none_or(|(best_count, _, _)| count > *best_count)
            {
                best = Some((count, granularity, candidates.clone()));
            }
            fallback = Some((granularity, candidates));
        }
        chosen = best
            .map(|(_, granularity, candidates)| (granularity, candidates))
            .or(fallback);
    }

    let Some((granularity, candidates)) = chosen else {
        return TimeTicks {
            max_ticks,
            ..TimeTicks::default()
        };
    };

    let mapped = is_intraday && granularity.is_intraday();
    let (mut values, mut times) = samples.project(&candidates, visible, mapped);
    if values.is_empty() {
        return TimeTicks {
            granularity: Some(granularity),
            max_ticks,
            ..TimeTicks::default()
        };
    }

    if granularity.injects_month_anchors() {
        inject_month_anchors(series, &samples, visible, (start_ts, end_ts), &mut values, &mut times);
    }

    let ctx = LabelContext {
        series,
        granularity,
        visible,
        chart_width_px,
        collision_radius_px: tuning.collision_radius_px,
    };
    let (labels, hidden) = format_tick_labels(&times, &values, &ctx);
    let base_unit = granularity.base_unit();

    trace!(
        timeframe = %series.timeframe(),
        granularity = %granularity.code(),
        ticks = values.len(),
        max_ticks,
        "time ticks computed"
    );

    let ticks = values
        .into_iter()
        .zip(times)
        .zip(labels)
        .map(|((index, ts), label)| AxisTick {
            index,
            ts,
            emphasized: !label.text.is_empty() && label.unit > base_unit,
            unit: label.unit,
            label: label.text,
        })
        .collect();

    TimeTicks {
        ticks,
        hidden,
        granularity: Some(granularity),
        max_ticks,
    }
}

/// Adds month-boundary ticks (first trading date of each month) that the grid missed.
fn inject_month_anchors(
    series: &TimeframeSeries,
    samples: &WindowSamples,
    visible: Option<(f64, f64)>,
    (start_ts, end_ts): (i64, i64),
    values: &mut Vec<i64>,
    times: &mut Vec<i64>,
) {
    let mut extra: Vec<(i64, i64)> = Vec::new();
    for anchor in series.month_first_trading_dates() {
        let anchor_ms = date_to_ms(anchor);
        if anchor_ms < start_ts - 2 * MS_PER_DAY || anchor_ms > end_ts + 2 * MS_PER_DAY {
            continue;
        }
        let pos = samples.ts.partition_point(|&ts| ts < anchor_ms);
        let Some(&bar_idx) = samples.idx.get(pos) else {
            continue;
        };
        if let Some((start, end)) = visible {
            let idx = bar_idx as f64;
            if idx < start - 1.0 || idx > end + 1.0 {
                continue;
            }
        }
        if values.contains(&bar_idx) || extra.iter().any(|(idx, _)| *idx == bar_idx) {
            continue;
        }
        if times.iter().any(|&ts| date_of(ts) == Some(anchor)) {
            continue;
        }
        extra.push((bar_idx, anchor_ms));
    }
    if extra.is_empty() {
        return;
    }

    let mut combined: Vec<(i64, i64)> = values.iter().copied().zip(times.iter().copied()).collect();
    combined.extend(extra);
    combined.sort_by_key(|(idx, _)| *idx);
    combined.dedup_by_key(|(idx, _)| *idx);
    let (merged_values, merged_times): (Vec<i64>, Vec<i64>) = combined.into_iter().unzip();
    *values = merged_values;
    *times = merged_times;
}
