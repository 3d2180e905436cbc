use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::primitives::{parse_display_time, round_half_up};
use crate::core::series::TimeframeSeries;

pub const DEFAULT_VISIBLE_BARS: i64 = 400;
pub const DEFAULT_BUFFER_FACTOR: f64 = 3.0;

/// Half the logical width of one candle body in index units.
pub const CANDLE_HALF_WIDTH: f64 = 0.5;

/// Sizing knobs shared by all window computations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowTuning {
    pub default_visible_bars: i64,
    pub buffer_factor: f64,
}

impl Default for WindowTuning {
    fn default() -> Self {
        Self {
            default_visible_bars: DEFAULT_VISIBLE_BARS,
            buffer_factor: DEFAULT_BUFFER_FACTOR,
        }
    }
}

/// Viewport state of one timeframe on one pane.
///
/// The buffered window `[window_start, window_end]` is what gets materialized;
/// the visible range is what the user sees. `view_start`/`view_end` are the
/// explicit axis bounds and may extend past the data to leave a gap. When
/// absent they derive from the visible range padded by half a candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub window_start: i64,
    pub window_end: i64,
    pub visible_start_idx: f64,
    pub visible_end_idx: f64,
    pub visible_bars: f64,
    #[serde(default)]
    pub view_start: Option<f64>,
    #[serde(default)]
    pub view_end: Option<f64>,
}

impl ViewState {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            window_start: 0,
            window_end: -1,
            visible_start_idx: 0.0,
            visible_end_idx: -1.0,
            visible_bars: 0.0,
            view_start: None,
            view_end: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window_end < self.window_start
    }

    /// Axis bounds, derived from the visible range when not set explicitly.
    #[must_use]
    pub fn view_range(&self) -> (f64, f64) {
        let start = self
            .view_start
            .unwrap_or(self.visible_start_idx - CANDLE_HALF_WIDTH);
        let end = self
            .view_end
            .unwrap_or(self.visible_end_idx + CANDLE_HALF_WIDTH);
        (start, end.max(start))
    }

    /// Empty space between the last visible candle's right edge and the axis end.
    #[must_use]
    pub fn right_gap(&self) -> f64 {
        let (_, end) = self.view_range();
        (end - (self.visible_end_idx + CANDLE_HALF_WIDTH)).max(0.0)
    }

    /// Empty space between the axis start and the first visible candle's left edge.
    #[must_use]
    pub fn left_gap(&self) -> f64 {
        let (start, _) = self.view_range();
        ((self.visible_start_idx - CANDLE_HALF_WIDTH) - start).max(0.0)
    }

    #[must_use]
    pub fn with_view_range(mut self, start: f64, end: f64) -> Self {
        self.view_start = Some(start);
        self.view_end = Some(end.max(start));
        self
    }
}

/// Requested bar count, capped at the bars the series actually has.
fn requested_bars(series: &TimeframeSeries, visible_bars: f64, tuning: WindowTuning) -> i64 {
    let available = series
        .max_idx()
        .saturating_sub(series.min_idx())
        .saturating_add(1)
        .max(1);
    let bars = if visible_bars.is_finite() && visible_bars >= 0.5 {
        round_half_up(visible_bars.min(available as f64)).max(1.0) as i64
    } else {
        tuning.default_visible_bars.max(1)
    };
    bars.min(available)
}

/// Places the buffered window around an already clamped visible range.
fn finish_state(
    series: &TimeframeSeries,
    visible_start: i64,
    visible_end: i64,
    tuning: WindowTuning,
) -> ViewState {
    let (min_idx, max_idx) = (series.min_idx(), series.max_idx());
    let visible_bars = (visible_end - visible_start + 1).max(1);

    let buffer_factor = if tuning.buffer_factor.is_finite() {
        tuning.buffer_factor
    } else {
        DEFAULT_BUFFER_FACTOR
    };
    let available = max_idx.saturating_sub(min_idx).saturating_add(1);
    let total_bars = ((visible_bars as f64 * buffer_factor).floor() as i64)
        .max(visible_bars)
        .min(available.max(visible_bars));

    let visible_center = 0.5 * (visible_start as f64 + visible_end as f64);
    let mut window_start = round_half_up(visible_center - (total_bars / 2) as f64) as i64;
    let mut window_end = window_start.saturating_add(total_bars - 1);
    if window_start < min_idx {
        window_start = min_idx;
        window_end = window_start.saturating_add(total_bars - 1);
    }
    if window_end > max_idx {
        window_end = max_idx;
        window_start = window_end.saturating_sub(total_bars - 1).max(min_idx);
    }

    trace!(
        timeframe = %series.timeframe(),
        visible_start,
        visible_end,
        window_start,
        window_end,
        "window computed"
    );

    ViewState {
        window_start,
        window_end,
        visible_start_idx: visible_start as f64,
        visible_end_idx: visible_end as f64,
        visible_bars: visible_bars as f64,
        view_start: Some(visible_start as f64 - CANDLE_HALF_WIDTH),
        view_end: Some(visible_end as f64 + CANDLE_HALF_WIDTH),
    }
}

/// Window with `visible_bars` bars centered on `center`.
///
/// A missing or non-finite center means the last bar; a non-positive count
/// means the default.
#[must_use]
pub fn compute_centered(
    series: &TimeframeSeries,
    visible_bars: f64,
    center: Option<f64>,
    tuning: WindowTuning,
) -> ViewState {
    if series.is_empty() {
        return ViewState::empty();
    }
    let (min_idx, max_idx) = (series.min_idx(), series.max_idx());
    let bars = requested_bars(series, visible_bars, tuning);
    let center = center
        .filter(|c| c.is_finite())
        .unwrap_or(max_idx as f64);

    let mut start = round_half_up(center - (bars / 2) as f64) as i64;
    let mut end = start.saturating_add(bars - 1);
    if start < min_idx {
        start = min_idx;
        end = start.saturating_add(bars - 1);
    }
    if end > max_idx {
        end = max_idx;
        start = end.saturating_sub(bars - 1).max(min_idx);
    }
    finish_state(series, start, end, tuning)
}

/// Window whose last visible bar is `anchor`.
#[must_use]
pub fn compute_right_anchored(
    series: &TimeframeSeries,
    visible_bars: f64,
    anchor: Option<f64>,
    tuning: WindowTuning,
) -> ViewState {
    if series.is_empty() {
        return ViewState::empty();
    }
    let Some(anchor) = anchor.filter(|a| a.is_finite()) else {
        return compute_centered(series, visible_bars, None, tuning);
    };
    let (min_idx, max_idx) = (series.min_idx(), series.max_idx());
    let bars = requested_bars(series, visible_bars, tuning);

    let mut end = round_half_up(anchor) as i64;
    let mut start = end.saturating_sub(bars - 1);
    if end > max_idx {
        end = max_idx;
        start = end.saturating_sub(bars - 1);
    }
    if start < min_idx {
        start = min_idx;
        end = start.saturating_add(bars - 1).min(max_idx);
    }
    finish_state(series, start, end, tuning)
}

/// Window covering exactly the bars whose timestamps fall in `[t0, t1]` (display times).
///
/// Falls back to the default window when neither end resolves to a bar.
#[must_use]
pub fn compute_from_time_range(
    series: &TimeframeSeries,
    range: Option<(&str, &str)>,
    tuning: WindowTuning,
) -> ViewState {
    let resolved = range.and_then(|(t0, t1)| {
        let ts0 = parse_display_time(t0)?;
        let ts1 = parse_display_time(t1)?;
        Some((ts0, ts1))
    });
    compute_from_ts_range(series, resolved, tuning)
}

/// Same as [`compute_from_time_range`] with epoch-millisecond bounds.
#[must_use]
pub fn compute_from_ts_range(
    series: &TimeframeSeries,
    range: Option<(i64, i64)>,
    tuning: WindowTuning,
) -> ViewState {
    let default_bars = tuning.default_visible_bars as f64;
    let Some((ts0, ts1)) = range else {
        return compute_centered(series, default_bars, None, tuning);
    };
    if series.is_empty() {
        return ViewState::empty();
    }

    let pos_l = series.find_pos_ge(ts0);
    let pos_r = series.find_pos_le(ts1);
    if pos_l.is_none() && pos_r.is_none() {
        return compute_centered(series, default_bars, None, tuning);
    }
    let mut pos_l = pos_l.unwrap_or(0);
    let mut pos_r = pos_r.unwrap_or(series.len() - 1);
    if pos_r < pos_l {
        std::mem::swap(&mut pos_l, &mut pos_r);
    }

    let (Some(left), Some(right)) = (series.bar_at_pos(pos_l), series.bar_at_pos(pos_r)) else {
        return compute_centered(series, default_bars, None, tuning);
    };
    let bars = (right.i - left.i + 1).max(1) as f64;
    let center = 0.5 * (left.i + right.i) as f64;
    compute_centered(series, bars, Some(center), tuning)
}
