use tracing::{debug, trace};

use crate::core::primitives::round_half_up;
use crate::core::{PaneSide, ViewState};
use crate::error::ViewerResult;
use crate::render::SceneRenderer;

use super::annotation_projector::box_visible_center;
use super::pane_sync::{
    FollowState, SnapshotPin, follow_view_state, keeps_manual_gap, pinned_view_state,
    preserved_view_state,
};
use super::session::RenderOptions;
use super::{PaneBehavior, ViewMode, ViewerSession, build_snapshot_series};

const CENTER_TIE_EPSILON: f64 = 1e-6;

/// How a pinned snapshot treats the left pane's current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinOptions {
    /// Keep the current left view, only clamped into the snapshot.
    pub preserve_view: bool,
    /// Pin triggered by panning: keep the view if it already leaves a lookahead gap.
    pub auto_pan: bool,
}

impl<R: SceneRenderer> ViewerSession<R> {
    /// Switches the left-pane behavior.
    ///
    /// Entering a follow mode recomputes the left pane from the right pane's
    /// current view. Entering independent mode drops every snapshot and
    /// re-renders the left pane from its own last view.
    pub fn set_pane_behavior(&mut self, behavior: PaneBehavior) -> ViewerResult<()> {
        if self.sync.behavior == behavior {
            return Ok(());
        }
        debug!(from = ?self.sync.behavior, to = ?behavior, "pane behavior changed");
        self.sync.behavior = behavior;
        if behavior == PaneBehavior::FollowStrict {
            self.clear_snapshot(false);
        }

        if behavior.is_follow() {
            return self.update_follow();
        }

        self.clear_snapshot(false);
        self.sync.clear_follow();
        if self.view_mode == ViewMode::Split {
            if let Some(state) = self.view_or_default(PaneSide::Left) {
                let y_range = self.regime_y_range(PaneSide::Left);
                self.commit_pane(PaneSide::Left, self.left_tf, state, RenderOptions::fixed(y_range))?;
            }
        }
        Ok(())
    }

    /// Re-derives the left-pane snapshot from the right pane's last visible bar.
    ///
    /// Only active in split view with a follow behavior; missing data is a no-op.
    pub fn update_follow(&mut self) -> ViewerResult<()> {
        if self.view_mode != ViewMode::Split || !self.sync.behavior.is_follow() {
            return Ok(());
        }
        let Some(right_state) = self.current_view(PaneSide::Right).cloned() else {
            return Ok(());
        };
        let Some(cursor_ts) = self.right_cursor_ts(&right_state) else {
            return Ok(());
        };
        let (Some(htf), Some(base)) = (self.store.non_empty(self.left_tf), self.snapshot_base()) else {
            return Ok(());
        };
        let Some(snapshot) = build_snapshot_series(htf, base, cursor_ts) else {
            trace!(cursor_ts, "follow snapshot unavailable");
            return Ok(());
        };

        let tuning = self.config.window_tuning();
        let state = follow_view_state(
            &snapshot,
            self.left.view(self.left_tf),
            right_state.visible_bars,
            self.config.follow_gap_ratio,
            tuning,
        );
        trace!(
            timeframe = %self.left_tf,
            cursor_ts,
            bar_index = snapshot.bar_index,
            "left pane follows right cursor"
        );
        self.sync.follow = Some(FollowState {
            timeframe: self.left_tf,
            snapshot,
        });
        let y_range = self.regime_y_range(PaneSide::Left);
        self.commit_pane(PaneSide::Left, self.left_tf, state, RenderOptions::fixed(y_range))
    }

    /// Open time of the right pane's last visible bar plus one right-timeframe bar.
    pub(super) fn right_cursor_ts(&self, right_state: &ViewState) -> Option<i64> {
        let series = self.store.non_empty(self.right_tf)?;
        if !right_state.visible_end_idx.is_finite() {
            return None;
        }
        let last_idx = (round_half_up(right_state.visible_end_idx) as i64)
            .clamp(series.min_idx(), series.max_idx());
        let bar = series.bar_at_index(last_idx)?;
        Some(bar.ts + self.right_tf.duration_ms())
    }

    /// Pins the left pane to the higher-timeframe picture at a setup's signal time.
    ///
    /// Ignored in strict follow mode. Any failure to build the snapshot clears
    /// the pin instead.
    pub fn pin_snapshot_for_setup(
        &mut self,
        setup_id: usize,
        options: PinOptions,
    ) -> ViewerResult<()> {
        if !self.sync.behavior.allows_pinned_snapshot() {
            return Ok(());
        }
        let Some(setup) = self.annotations.setup(setup_id).cloned() else {
            self.clear_snapshot(false);
            return Ok(());
        };
        self.annotations.mark_snapshot_box(Some(setup.box_pos));
        if self.view_mode != ViewMode::Split {
            self.clear_snapshot(false);
            return Ok(());
        }

        let cursor_ts = setup.signal_ts + self.right_tf.duration_ms();
        let built = match (self.store.non_empty(self.left_tf), self.snapshot_base()) {
            (Some(htf), Some(base)) => build_snapshot_series(htf, base, cursor_ts),
            _ => None,
        };
        let Some(snapshot) = built else {
            debug!(setup_id, cursor_ts, "snapshot unavailable; clearing pin");
            self.clear_snapshot(false);
            return Ok(());
        };

        let tuning = self.config.window_tuning();
        let gap_ratio = self.config.follow_gap_ratio;
        let previous = self.left.view(self.left_tf).cloned();
        let regime_y = self.regime_y_range(PaneSide::Left);
        let bar_index = snapshot.bar_index;

        let preserve = options.preserve_view
            || (options.auto_pan
                && previous
                    .as_ref()
                    .is_some_and(|prev| keeps_manual_gap(prev, bar_index, gap_ratio)));

        let (state, render) = match previous.as_ref().filter(|_| preserve) {
            Some(prev) => (
                preserved_view_state(&snapshot, prev, tuning),
                RenderOptions::fixed(regime_y),
            ),
            None => {
                let state = pinned_view_state(&snapshot, previous.as_ref(), gap_ratio, tuning);
                let recentered = regime_y.and_then(|(lo, hi)| {
                    let height = hi - lo;
                    let bar = snapshot
                        .series
                        .bar_at_index(bar_index)
                        .or_else(|| snapshot.series.last())?;
                    let center = bar.mid();
                    (height > 0.0 && center.is_finite())
                        .then(|| (center - height / 2.0, center + height / 2.0))
                });
                let render = match recentered {
                    Some(range) => RenderOptions::fixed(Some(range)),
                    None => RenderOptions::auto(),
                };
                (state, render)
            }
        };

        debug!(
            setup_id,
            timeframe = %self.left_tf,
            cursor_ts,
            bar_index,
            preserve,
            "snapshot pinned"
        );
        self.sync.pinned = Some(SnapshotPin {
            timeframe: self.left_tf,
            setup_id: Some(setup_id),
            signal_ts: setup.signal_ts,
            snapshot,
        });
        self.commit_pane(PaneSide::Left, self.left_tf, state, render)
    }

    /// Index of the pinned signal bar in the right pane's current timeframe.
    #[must_use]
    pub fn pinned_signal_index(&self) -> Option<i64> {
        let pin = self.sync.pinned.as_ref()?;
        let ltf = self.store.non_empty(self.right_tf)?;
        ltf.find_pos_le(pin.signal_ts)
            .and_then(|pos| ltf.bar_at_pos(pos))
            .map(|bar| bar.i)
    }

    /// Drops the pinned snapshot and the box highlight.
    pub fn clear_snapshot(&mut self, clear_selection: bool) {
        if self.sync.pinned.is_some() {
            debug!("snapshot cleared");
        }
        self.annotations.mark_snapshot_box(None);
        self.sync.clear_pin();
        if clear_selection {
            self.set_selected_setup(None);
        }
    }

    /// Setup whose box is closest to the middle of `state`'s visible range on
    /// the right pane. Ties go to the later box.
    #[must_use]
    pub fn auto_select_setup(&self, state: &ViewState, excluded: Option<usize>) -> Option<usize> {
        let series = self.store.non_empty(self.right_tf)?;
        let (vs, ve) = (state.visible_start_idx, state.visible_end_idx);
        if !vs.is_finite() || !ve.is_finite() {
            return None;
        }
        let view_center = 0.5 * (vs + ve);

        let mut best: Option<(usize, f64, f64)> = None;
        for setup in self.annotations.setups() {
            if Some(setup.id) == excluded {
                continue;
            }
            let Some(b) = self.annotations.setup_box(setup) else {
                continue;
            };
            let Some(center) =
                box_visible_center(b, series, (vs, ve), self.config.signal_base_minutes)
            else {
                continue;
            };
            let score = (center - view_center).abs();
            let better = match best {
                None => true,
                Some((_, best_center, best_score)) => {
                    score < best_score - CENTER_TIE_EPSILON
                        || ((score - best_score).abs() <= CENTER_TIE_EPSILON && center > best_center)
                }
            };
            if better {
                best = Some((setup.id, center, score));
            }
        }
        best.map(|(id, _, _)| id)
    }

    /// Latest annotation close time shown on the left pane while `setup_id` is focused.
    pub(super) fn set_focus_cutoff(&mut self, setup_id: Option<usize>) {
        let signal_base_ms = self.config.signal_base_minutes * crate::core::primitives::MS_PER_MINUTE;
        self.sync.max_signal_ts = match setup_id {
            Some(id) if self.sync.behavior.allows_pinned_snapshot() => self
                .annotations
                .setup(id)
                .map(|setup| setup.signal_ts + signal_base_ms),
            _ => None,
        };
    }
}
