use tracing::{debug, warn};

use crate::core::primitives::{parse_display_time, round_half_up};
use crate::core::{PaneSide, Timeframe, ViewState, compute_from_time_range, compute_right_anchored};
use crate::error::{ViewerError, ViewerResult};
use crate::render::SceneRenderer;

use super::pane_sync::{FollowState, SnapshotPin};
use super::session::RenderOptions;
use super::{ViewMode, ViewerSession, build_snapshot_series};

/// Carries the outer gaps of `old` over to `state`, scaled by the ratio of
/// visible spans so the empty margin keeps its share of the view.
fn rescale_gaps(state: &mut ViewState, old: &ViewState) {
    let old_span = old.visible_end_idx - old.visible_start_idx;
    let new_span = state.visible_end_idx - state.visible_start_idx;
    if !(old_span > 0.0 && new_span > 0.0) {
        return;
    }
    if let Some(old_end) = old.view_end {
        let gap = old_end - (old.visible_end_idx + 0.5);
        state.view_end = Some(state.visible_end_idx + 0.5 + new_span * (gap / old_span));
    }
    if let Some(old_start) = old.view_start {
        let gap = (old.visible_start_idx - 0.5) - old_start;
        state.view_start = Some(state.visible_start_idx - 0.5 - new_span * (gap / old_span));
    }
}

impl<R: SceneRenderer> ViewerSession<R> {
    /// Switches the timeframe shown on `pane`.
    ///
    /// Within one regime the visible time range and Y-range carry over. Across
    /// regimes the view is right-anchored on the previous last visible bar with
    /// the bar count rescaled by the timeframe ratio. On the left pane a pinned
    /// snapshot is rebuilt at the same cursor, otherwise the follow snapshot is.
    pub fn set_timeframe(&mut self, pane: PaneSide, timeframe: Timeframe) -> ViewerResult<()> {
        if !timeframe.allowed_on(pane) {
            return Err(ViewerError::TimeframeNotAllowed {
                timeframe: timeframe.to_string(),
                pane: pane.as_str().to_owned(),
            });
        }
        let old_tf = self.timeframe(pane);
        if old_tf == timeframe {
            return Ok(());
        }
        if self.store.non_empty(timeframe).is_none() {
            warn!(pane = pane.as_str(), timeframe = %timeframe, "no bars for timeframe; switch ignored");
            return Ok(());
        }
        debug!(pane = pane.as_str(), from = %old_tf, to = %timeframe, "timeframe switch");

        match pane {
            PaneSide::Right => self.right_tf = timeframe,
            PaneSide::Left => {
                self.left_tf = timeframe;
                self.resync_left_snapshot(timeframe);
            }
        }

        let Some((state, options)) = self.switched_view(pane, old_tf, timeframe) else {
            return Ok(());
        };
        self.commit_pane(pane, timeframe, state, options)?;

        if pane == PaneSide::Right && self.sync.pinned.is_none() {
            self.update_follow()?;
        }
        Ok(())
    }

    /// Rebuilds the left snapshot for a new left timeframe without rendering.
    fn resync_left_snapshot(&mut self, timeframe: Timeframe) {
        let pinned = self.sync.pinned.take();
        let max_signal_ts = self.sync.max_signal_ts;
        self.clear_snapshot(false);

        if let Some(pin) = pinned {
            let rebuilt = match (self.store.non_empty(timeframe), self.snapshot_base()) {
                (Some(htf), Some(base)) => build_snapshot_series(htf, base, pin.snapshot.cursor_ts),
                _ => None,
            };
            if let Some(snapshot) = rebuilt {
                if let Some(box_pos) = pin
                    .setup_id
                    .and_then(|id| self.annotations.setup(id))
                    .map(|setup| setup.box_pos)
                {
                    self.annotations.mark_snapshot_box(Some(box_pos));
                }
                self.sync.max_signal_ts = max_signal_ts;
                self.sync.pinned = Some(SnapshotPin {
                    timeframe,
                    snapshot,
                    ..pin
                });
                return;
            }
        }

        if self.view_mode != ViewMode::Split || !self.sync.behavior.is_follow() {
            self.sync.clear_follow();
            return;
        }
        let follow = self
            .current_view(PaneSide::Right)
            .and_then(|right_state| self.right_cursor_ts(right_state))
            .and_then(|cursor_ts| {
                let htf = self.store.non_empty(timeframe)?;
                let base = self.snapshot_base()?;
                build_snapshot_series(htf, base, cursor_ts)
            });
        if let Some(snapshot) = follow {
            self.sync.follow = Some(FollowState { timeframe, snapshot });
        }
    }

    /// View and Y handling for `pane` after switching `from` -> `to`.
    fn switched_view(
        &self,
        pane: PaneSide,
        from: Timeframe,
        to: Timeframe,
    ) -> Option<(ViewState, RenderOptions)> {
        let series = self.pane_series(pane, to)?;
        let tuning = self.config.window_tuning();
        let regimes = &self.pane(pane).regimes;
        let old_cache = regimes.get(from.regime(pane));

        if from.regime(pane) == to.regime(pane) {
            let range = old_cache
                .time_range
                .as_ref()
                .map(|(first, last)| (first.as_str(), last.as_str()));
            let mut state = compute_from_time_range(series, range, tuning);
            if let Some(old) = self.pane(pane).view(from) {
                rescale_gaps(&mut state, old);
            }
            return Some((state, RenderOptions::fixed(old_cache.y_range)));
        }

        let anchor = old_cache
            .anchor_time
            .as_deref()
            .and_then(parse_display_time)
            .and_then(|ts| series.find_pos_le(ts))
            .and_then(|pos| series.bar_at_pos(pos))
            .map_or(series.max_idx(), |bar| bar.i);

        let new_cache = regimes.get(to.regime(pane));
        let mut visible_bars = new_cache
            .visible_bars_hint
            .filter(|hint| *hint > 0.0)
            .unwrap_or(tuning.default_visible_bars as f64);
        if let Some(last_tf) = new_cache.last_tf.filter(|tf| *tf != to) {
            let ratio = last_tf.minutes() as f64 / to.minutes() as f64;
            visible_bars = round_half_up(visible_bars * ratio).max(self.config.min_reanchor_bars as f64);
        }

        let state = compute_right_anchored(series, visible_bars, Some(anchor as f64), tuning);
        let options = if new_cache.initialized {
            RenderOptions::fixed(new_cache.y_range)
        } else {
            RenderOptions::auto()
        };
        Some((state, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps_scale_with_span() {
        let old = ViewState {
            window_start: 0,
            window_end: 100,
            visible_start_idx: 10.0,
            visible_end_idx: 20.0,
            visible_bars: 11.0,
            view_start: Some(9.5),
            view_end: Some(22.5),
        };
        let mut state = ViewState {
            window_start: 0,
            window_end: 100,
            visible_start_idx: 40.0,
            visible_end_idx: 60.0,
            visible_bars: 21.0,
            view_start: Some(39.5),
            view_end: Some(60.5),
        };
        rescale_gaps(&mut state, &old);
        assert!((state.view_end.expect("end") - 64.5).abs() <= 1e-9);
        assert!((state.view_start.expect("start") - 39.5).abs() <= 1e-9);
    }
}
