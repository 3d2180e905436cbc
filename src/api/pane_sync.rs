use serde::{Deserialize, Serialize};

use crate::core::primitives::round_half_up;
use crate::core::{
    CANDLE_HALF_WIDTH, Timeframe, TimeframeSeries, ViewState, WindowTuning, compute_centered,
    compute_right_anchored,
};

use super::SnapshotSeries;

/// How the left (higher timeframe) pane relates to the right pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaneBehavior {
    /// User-driven; focus actions may still pin a historical snapshot.
    #[default]
    #[serde(rename = "independent_snapshots")]
    Independent,
    /// Tracks the right pane's last visible bar and allows pinned snapshots.
    #[serde(rename = "follow_ltf_snapshots")]
    FollowSnapshot,
    /// Tracks the right pane's last visible bar and never pins.
    #[serde(rename = "follow_ltf_strict")]
    FollowStrict,
}

impl PaneBehavior {
    #[must_use]
    pub fn is_follow(self) -> bool {
        matches!(self, Self::FollowSnapshot | Self::FollowStrict)
    }

    #[must_use]
    pub fn allows_pinned_snapshot(self) -> bool {
        matches!(self, Self::Independent | Self::FollowSnapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Single,
    Split,
}

/// Historical snapshot pinned to a setup's signal time.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPin {
    pub timeframe: Timeframe,
    pub setup_id: Option<usize>,
    pub signal_ts: i64,
    pub snapshot: SnapshotSeries,
}

/// Snapshot derived from the right pane's live cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowState {
    pub timeframe: Timeframe,
    pub snapshot: SnapshotSeries,
}

/// Snapshot and follow bookkeeping of the left pane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneSynchronizer {
    pub(super) behavior: PaneBehavior,
    pub(super) pinned: Option<SnapshotPin>,
    pub(super) follow: Option<FollowState>,
    /// Latest annotation close time allowed on the left pane while a setup is focused.
    pub(super) max_signal_ts: Option<i64>,
}

impl PaneSynchronizer {
    #[must_use]
    pub fn behavior(&self) -> PaneBehavior {
        self.behavior
    }

    #[must_use]
    pub fn pinned(&self) -> Option<&SnapshotPin> {
        self.pinned.as_ref()
    }

    #[must_use]
    pub fn follow(&self) -> Option<&FollowState> {
        self.follow.as_ref()
    }

    #[must_use]
    pub fn max_signal_ts(&self) -> Option<i64> {
        self.max_signal_ts
    }

    /// Series the left pane draws for `timeframe`, if a snapshot replaces the stored one.
    #[must_use]
    pub fn left_series(&self, timeframe: Timeframe) -> Option<&TimeframeSeries> {
        if let Some(pin) = self.pinned.as_ref().filter(|pin| pin.timeframe == timeframe) {
            return Some(&pin.snapshot.series);
        }
        self.follow
            .as_ref()
            .filter(|follow| follow.timeframe == timeframe)
            .map(|follow| &follow.snapshot.series)
    }

    /// Annotations closing after this time stay hidden on the left pane.
    #[must_use]
    pub fn cutoff_ts(&self) -> Option<i64> {
        self.max_signal_ts
            .or_else(|| self.follow.as_ref().map(|follow| follow.snapshot.cursor_ts))
    }

    pub(super) fn clear_pin(&mut self) {
        self.pinned = None;
        self.max_signal_ts = None;
    }

    pub(super) fn clear_follow(&mut self) {
        self.follow = None;
    }
}

fn lookahead_target(visible_bars: f64, gap_ratio: f64) -> f64 {
    round_half_up(visible_bars * gap_ratio).max(1.0)
}

/// Left-pane view while following the right pane's cursor.
///
/// A lookahead gap the user left at least `gap_ratio` of the visible bars wide
/// is kept along with the previous visible range. Otherwise the view is
/// right-anchored on the snapshot bar with a gap of `max(target, previous gap)`.
#[must_use]
pub fn follow_view_state(
    snapshot: &SnapshotSeries,
    previous: Option<&ViewState>,
    fallback_bars: f64,
    gap_ratio: f64,
    tuning: WindowTuning,
) -> ViewState {
    let series = &snapshot.series;
    let (min_idx, max_idx) = (series.min_idx() as f64, series.max_idx() as f64);
    let bar_index = snapshot.bar_index as f64;

    let bars = previous
        .map(|prev| prev.visible_bars)
        .filter(|bars| *bars > 0.0)
        .or(Some(fallback_bars).filter(|bars| *bars > 0.0))
        .unwrap_or(tuning.default_visible_bars as f64);
    let bars = round_half_up(bars).max(1.0);
    let target_gap = lookahead_target(bars, gap_ratio);

    let current_gap = previous
        .and_then(|prev| prev.view_end)
        .map(|end| end - (bar_index + CANDLE_HALF_WIDTH))
        .filter(|gap| gap.is_finite() && *gap > 0.0)
        .unwrap_or(0.0);

    if let Some(prev) = previous.filter(|_| current_gap >= target_gap) {
        let mut vis_start = prev.visible_start_idx.clamp(min_idx, max_idx);
        let mut vis_end = prev.visible_end_idx.clamp(min_idx, max_idx);
        if vis_end < vis_start {
            vis_start = (bar_index - (bars - 1.0)).max(min_idx);
            vis_end = bar_index.min(max_idx);
        }
        let kept_bars = round_half_up(vis_end - vis_start + 1.0).max(1.0);
        let mut state = compute_centered(series, kept_bars, Some(0.5 * (vis_start + vis_end)), tuning);
        state.visible_start_idx = vis_start;
        state.visible_end_idx = vis_end;
        state.visible_bars = kept_bars;
        state.view_start = Some(prev.view_start.unwrap_or(vis_start - CANDLE_HALF_WIDTH));
        state.view_end = Some(
            prev.view_end
                .unwrap_or(vis_end + CANDLE_HALF_WIDTH + target_gap),
        );
        return state;
    }

    let prev_gap = previous.map_or(0.0, ViewState::right_gap);
    let state = compute_right_anchored(series, bars, Some(bar_index), tuning);
    let gap = target_gap.max(prev_gap);
    let (start, end) = (state.visible_start_idx, state.visible_end_idx);
    state.with_view_range(start - CANDLE_HALF_WIDTH, end + CANDLE_HALF_WIDTH + gap)
}

/// True when the left pane already leaves a lookahead gap past the snapshot bar
/// of at least `max(1, gap_ratio * visible width)`.
#[must_use]
pub fn keeps_manual_gap(previous: &ViewState, bar_index: i64, gap_ratio: f64) -> bool {
    let Some(view_end) = previous.view_end else {
        return false;
    };
    let gap = view_end - (bar_index as f64 + CANDLE_HALF_WIDTH);
    let width = previous.visible_end_idx - previous.visible_start_idx;
    gap >= (width * gap_ratio).max(1.0)
}

/// Previous left-pane view clamped into a (shorter) snapshot series.
#[must_use]
pub fn preserved_view_state(
    snapshot: &SnapshotSeries,
    previous: &ViewState,
    tuning: WindowTuning,
) -> ViewState {
    let series = &snapshot.series;
    let (min_idx, max_idx) = (series.min_idx() as f64, series.max_idx() as f64);
    let mut vis_start = previous.visible_start_idx.max(min_idx);
    let mut vis_end = previous.visible_end_idx.min(max_idx);
    if vis_end < vis_start {
        vis_start = (max_idx - tuning.default_visible_bars as f64).max(min_idx);
        vis_end = max_idx;
    }
    let bars = round_half_up(vis_end - vis_start + 1.0).max(1.0);
    let mut state = compute_centered(series, bars, Some(0.5 * (vis_start + vis_end)), tuning);
    state.visible_start_idx = vis_start;
    state.visible_end_idx = vis_end;
    state.visible_bars = previous.visible_bars;
    state.view_start = previous.view_start;
    state.view_end = previous.view_end;
    state
}

/// Left-pane view for a freshly pinned snapshot: right-anchored on the snapshot
/// bar with a lookahead gap of `max(1, round(span * gap_ratio))`.
#[must_use]
pub fn pinned_view_state(
    snapshot: &SnapshotSeries,
    previous: Option<&ViewState>,
    gap_ratio: f64,
    tuning: WindowTuning,
) -> ViewState {
    let bars = previous
        .map(|prev| prev.visible_bars)
        .filter(|bars| bars.is_finite() && *bars > 0.0)
        .unwrap_or(tuning.default_visible_bars as f64);
    let state = compute_right_anchored(&snapshot.series, bars, Some(snapshot.bar_index as f64), tuning);
    let span = (state.visible_end_idx - state.visible_start_idx + 1.0).max(1.0);
    let gap = lookahead_target(span, gap_ratio);
    let (start, end) = (state.visible_start_idx, state.visible_end_idx);
    state.with_view_range(start - CANDLE_HALF_WIDTH, end + CANDLE_HALF_WIDTH + gap)
}
