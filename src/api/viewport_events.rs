use tracing::{debug, trace};

use crate::core::primitives::round_half_up;
use crate::core::{
    CANDLE_HALF_WIDTH, PaneSide, TimeframeSeries, ViewState, WindowTuning, compute_centered,
    compute_right_anchored, vertical_correction,
};
use crate::error::ViewerResult;
use crate::interaction::{EventOrigin, ViewportChange};
use crate::render::SceneRenderer;

use super::session::RenderOptions;
use super::sync_controller::PinOptions;
use super::{ViewMode, ViewerSession};

const MIN_VIEW_SPAN: f64 = 1e-6;

/// Folds a requested horizontal range into `state`.
///
/// A range entirely past either end of the data is shifted back so it touches
/// the data band with the same span. When nothing of the data remains in view
/// only the view bounds change; otherwise the visible indices follow the part
/// of the range that overlaps the data.
#[must_use]
pub fn apply_x_range(
    series: &TimeframeSeries,
    state: &ViewState,
    (start, end): (f64, f64),
    tuning: WindowTuning,
) -> ViewState {
    let band_start = series.min_idx() as f64 - CANDLE_HALF_WIDTH;
    let band_end = series.max_idx() as f64 + CANDLE_HALF_WIDTH;
    let (mut view_start, mut view_end) = if start.is_finite() && end.is_finite() {
        (start, end)
    } else {
        (
            state.view_start.unwrap_or(band_start),
            state.view_end.unwrap_or(band_end),
        )
    };

    let mut span = (view_end - view_start).abs();
    if span < MIN_VIEW_SPAN {
        span = 1.0;
    }
    if view_start > band_end {
        view_end = band_end;
        view_start = view_end - span;
    } else if view_end < band_start {
        view_start = band_start;
        view_end = view_start + span;
    }
    if view_start == view_end {
        view_end = view_start + 1.0;
    }

    let left = view_start.min(view_end).max(band_start);
    let right = view_start.max(view_end).min(band_end);
    if right < left {
        return state.clone().with_view_range(view_start, view_end);
    }

    let mut visible_start = left + CANDLE_HALF_WIDTH;
    let mut visible_end = right - CANDLE_HALF_WIDTH;
    if visible_end < visible_start {
        std::mem::swap(&mut visible_start, &mut visible_end);
    }
    let bars = round_half_up(visible_end - visible_start + 1.0).max(1.0);
    let center = 0.5 * (visible_start + visible_end);
    let mut next = compute_centered(series, bars, Some(center), tuning);
    next.visible_start_idx = visible_start;
    next.visible_end_idx = visible_end;
    next.visible_bars = (visible_end - visible_start + 1.0).max(1.0);
    next.with_view_range(view_start, view_end)
}

impl<R: SceneRenderer> ViewerSession<R> {
    /// Handles a zoom or pan reported by the renderer for `pane`.
    ///
    /// System-originated changes are dropped. After the pane is committed, a
    /// right-pane change may release a pinned snapshot whose signal bar left
    /// the view, auto-select the setup nearest the view centre, or move the
    /// follow snapshot.
    pub fn handle_viewport_event(
        &mut self,
        pane: PaneSide,
        change: ViewportChange,
        origin: EventOrigin,
    ) -> ViewerResult<()> {
        if origin == EventOrigin::System {
            trace!(pane = pane.as_str(), "system viewport change ignored");
            return Ok(());
        }
        let tf = self.timeframe(pane);
        let tuning = self.config.window_tuning();
        let padding = self.config.auto_pan_padding_ratio;
        let Some(series) = self.pane_series(pane, tf) else {
            return Ok(());
        };

        let mut state = self
            .pane(pane)
            .view(tf)
            .cloned()
            .unwrap_or_else(|| compute_centered(series, tuning.default_visible_bars as f64, None, tuning));
        if let Some(range) = change.x_range {
            state = apply_x_range(series, &state, range, tuning);
        }

        let regime = tf.regime(pane);
        let mut y_range = change
            .y_range
            .or(self.pane(pane).regimes.get(regime).y_range);
        let corrected = y_range.and_then(|range| {
            vertical_correction(series, state.visible_start_idx, state.visible_end_idx, range, padding)
        });
        if let Some(correction) = corrected {
            y_range = Some(correction.range);
        }
        if change.y_range.is_some() || corrected.is_some() {
            self.pane_mut(pane).regimes.get_mut(regime).y_range = y_range;
        }

        trace!(
            pane = pane.as_str(),
            timeframe = %tf,
            visible_start = state.visible_start_idx,
            visible_end = state.visible_end_idx,
            "viewport change applied"
        );
        self.commit_pane(pane, tf, state.clone(), RenderOptions::fixed(y_range))?;

        if pane == PaneSide::Right {
            self.sync_after_right_change(&state)?;
        }
        Ok(())
    }

    fn sync_after_right_change(&mut self, state: &ViewState) -> ViewerResult<()> {
        let allows_pin = self.sync.behavior.allows_pinned_snapshot();
        let mut excluded = None;

        let released = self.pinned_signal_index().and_then(|idx| {
            let idx = idx as f64;
            let outside = idx < state.visible_start_idx || idx > state.visible_end_idx;
            outside.then(|| self.sync.pinned.as_ref().and_then(|pin| pin.setup_id))
        });
        if let Some(setup_id) = released.filter(|_| allows_pin) {
            debug!(?setup_id, "signal bar left the view; releasing snapshot");
            excluded = setup_id;
            self.clear_snapshot(true);
            self.rerender_released_left()?;
        }

        if self.view_mode != ViewMode::Split {
            return Ok(());
        }
        if allows_pin && self.sync.pinned.is_none() && self.selected_setup.is_none() {
            if let Some(setup_id) = self.auto_select_setup(state, excluded) {
                debug!(setup_id, "setup auto-selected from view");
                self.set_selected_setup(Some(setup_id));
                self.set_focus_cutoff(Some(setup_id));
                self.pin_snapshot_for_setup(
                    setup_id,
                    PinOptions {
                        preserve_view: false,
                        auto_pan: true,
                    },
                )?;
            }
        }
        if self.sync.pinned.is_none() && self.sync.behavior.is_follow() {
            self.update_follow()?;
        }
        Ok(())
    }

    /// Left pane after a snapshot release: same visible range on the full series.
    fn rerender_released_left(&mut self) -> ViewerResult<()> {
        let tf = self.left_tf;
        let tuning = self.config.window_tuning();
        let Some(series) = self.store.non_empty(tf) else {
            return Ok(());
        };
        let state = match self.left.view(tf) {
            Some(prev) if prev.visible_start_idx.is_finite() && prev.visible_end_idx.is_finite() => {
                let bars = round_half_up(prev.visible_end_idx - prev.visible_start_idx + 1.0).max(1.0);
                let center = 0.5 * (prev.visible_start_idx + prev.visible_end_idx);
                let recomputed = compute_centered(series, bars, Some(center), tuning);
                match (prev.view_start, prev.view_end) {
                    (Some(start), Some(end)) => recomputed.with_view_range(start, end),
                    _ => recomputed,
                }
            }
            _ => compute_right_anchored(
                series,
                tuning.default_visible_bars as f64,
                Some(series.max_idx() as f64),
                tuning,
            ),
        };
        let y_range = self.regime_y_range(PaneSide::Left);
        self.commit_pane(PaneSide::Left, tf, state, RenderOptions::fixed(y_range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Bar, Timeframe};

    fn series(n: i64) -> TimeframeSeries {
        let bars = (0..n)
            .map(|i| Bar::at(i, 1_700_000_000_000 + i * 60_000, 1.0, 2.0, 0.5, 1.5).expect("bar"))
            .collect();
        TimeframeSeries::new(Timeframe::M1, bars).expect("series")
    }

    #[test]
    fn range_past_the_end_is_pulled_back() {
        let s = series(100);
        let tuning = WindowTuning::default();
        let base = compute_centered(&s, 20.0, None, tuning);
        let next = apply_x_range(&s, &base, (150.0, 170.0), tuning);
        assert_eq!(next.view_range(), (79.5, 99.5));
        assert!((next.visible_end_idx - 99.0).abs() <= 1e-9);
        assert!((next.visible_start_idx - 80.0).abs() <= 1e-9);
    }

    #[test]
    fn partial_overlap_keeps_requested_bounds() {
        let s = series(100);
        let tuning = WindowTuning::default();
        let base = compute_centered(&s, 20.0, None, tuning);
        let next = apply_x_range(&s, &base, (90.0, 120.0), tuning);
        assert_eq!(next.view_range(), (90.0, 120.0));
        assert!((next.visible_start_idx - 90.5).abs() <= 1e-9);
        assert!((next.visible_end_idx - 99.0).abs() <= 1e-9);
    }
}
