use tracing::debug;

use crate::core::primitives::round_half_up;
use crate::core::{CANDLE_HALF_WIDTH, PaneSide, ViewState, Viewport, compute_right_anchored};
use crate::error::ViewerResult;
use crate::interaction::AxisMode;
use crate::render::SceneRenderer;

use super::session::RenderOptions;
use super::{ViewMode, ViewerSession};

pub const MIN_SPLIT_FRACTION: f64 = 0.1;
pub const MAX_SPLIT_FRACTION: f64 = 0.9;

const SPLIT_ENTER_WIDTH_FACTOR: f64 = 0.5;
const SPLIT_LEAVE_WIDTH_FACTOR: f64 = 2.0;

/// Which outer gaps survive a width change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GapPolicy {
    /// Keep the lookahead gap only; the left edge follows the bar count.
    RightOnly,
    Both,
}

#[must_use]
pub fn clamp_split_fraction(fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction.clamp(MIN_SPLIT_FRACTION, MAX_SPLIT_FRACTION)
    } else {
        0.5
    }
}

impl<R: SceneRenderer> ViewerSession<R> {
    /// Switches between the single right pane and the dual-pane layout.
    ///
    /// The right pane keeps its right edge and lookahead gap while its bar
    /// count halves (entering split) or doubles (leaving split).
    pub fn set_view_mode(&mut self, mode: ViewMode) -> ViewerResult<()> {
        let old_mode = self.view_mode;
        if old_mode == mode {
            return Ok(());
        }
        debug!(from = ?old_mode, to = ?mode, "view mode changed");
        self.view_mode = mode;
        if mode == ViewMode::Single {
            self.clear_snapshot(false);
        }

        if mode == ViewMode::Split {
            if self.store.non_empty(self.left_tf).is_none() {
                if let Some(fallback) = self.store.first_timeframe() {
                    self.left_tf = fallback;
                }
            }
            if let Some(state) = self.view_or_default(PaneSide::Left) {
                let cache = self.current_regime(PaneSide::Left);
                let options = RenderOptions {
                    auto_y: !cache.initialized,
                    y_override: cache.y_range,
                };
                self.commit_pane(PaneSide::Left, self.left_tf, state, options)?;
            }
        }

        let factor = match mode {
            ViewMode::Split => SPLIT_ENTER_WIDTH_FACTOR,
            ViewMode::Single => SPLIT_LEAVE_WIDTH_FACTOR,
        };
        self.reanchor_to_right_edge(PaneSide::Right, factor, GapPolicy::RightOnly)?;

        if mode == ViewMode::Split && self.current_view(PaneSide::Right).is_some() {
            self.update_follow()?;
        }
        Ok(())
    }

    /// Sets which axes accept user zoom and pan, then redraws.
    pub fn set_axis_mode(&mut self, mode: AxisMode) -> ViewerResult<()> {
        if self.axis_mode == mode {
            return Ok(());
        }
        self.axis_mode = mode;
        self.rerender_all()
    }

    /// Left-pane share of the split layout, clamped to `[0.1, 0.9]`.
    pub fn set_split_fraction(&mut self, fraction: f64) {
        self.split_fraction = clamp_split_fraction(fraction);
    }

    /// Records a new pane size and rescales its bar count by the width ratio,
    /// keeping both outer gaps.
    pub fn resize_pane(&mut self, pane: PaneSide, width_px: f64, height_px: f64) -> ViewerResult<()> {
        let size = Viewport::new(width_px, height_px)?;
        let previous = self.pane_mut(pane).size.replace(size);
        let Some(previous) = previous.filter(|prev| prev.width > 0.0) else {
            return Ok(());
        };
        let factor = size.width / previous.width;
        if (factor - 1.0).abs() <= f64::EPSILON {
            return Ok(());
        }
        if pane == PaneSide::Left && self.view_mode != ViewMode::Split {
            return Ok(());
        }
        self.reanchor_to_right_edge(pane, factor, GapPolicy::Both)
    }

    /// Right-anchors `pane` on its last visible bar with `factor` times the bars.
    fn reanchor_to_right_edge(
        &mut self,
        pane: PaneSide,
        factor: f64,
        gaps: GapPolicy,
    ) -> ViewerResult<()> {
        let tf = self.timeframe(pane);
        let tuning = self.config.window_tuning();
        let min_bars = self.config.min_reanchor_bars as f64;
        let Some(series) = self.pane_series(pane, tf) else {
            return Ok(());
        };

        let stored = self.pane(pane).view(tf).cloned();
        let right_gap = stored.as_ref().and_then(|state| {
            state
                .view_end
                .map(|end| end - (state.visible_end_idx + CANDLE_HALF_WIDTH))
        });
        let left_gap = stored.as_ref().and_then(|state| {
            state
                .view_start
                .map(|start| (state.visible_start_idx - CANDLE_HALF_WIDTH) - start)
        });
        let state = stored.unwrap_or_else(|| {
            compute_right_anchored(
                series,
                tuning.default_visible_bars as f64,
                Some(series.max_idx() as f64),
                tuning,
            )
        });

        let anchor = [state.visible_end_idx, state.visible_start_idx]
            .into_iter()
            .find(|idx| idx.is_finite())
            .unwrap_or(series.max_idx() as f64);
        let mut bars = if state.visible_bars > 0.0 {
            state.visible_bars
        } else {
            tuning.default_visible_bars as f64
        };
        if factor.is_finite() && factor > 0.0 {
            bars = round_half_up(bars * factor).max(min_bars);
        }

        let mut next = compute_right_anchored(series, bars, Some(anchor), tuning);
        apply_gaps(&mut next, right_gap, left_gap.filter(|_| gaps == GapPolicy::Both));
        debug!(
            pane = pane.as_str(),
            timeframe = %tf,
            factor,
            bars = next.visible_bars,
            "pane re-anchored to right edge"
        );

        let y_range = self.regime_y_range(pane);
        self.commit_pane(pane, tf, next, RenderOptions::fixed(y_range))
    }
}

fn apply_gaps(state: &mut ViewState, right_gap: Option<f64>, left_gap: Option<f64>) {
    if let Some(gap) = left_gap.filter(|gap| gap.is_finite()) {
        state.view_start = Some(state.visible_start_idx - CANDLE_HALF_WIDTH - gap);
    }
    let Some(gap) = right_gap.filter(|gap| gap.is_finite()) else {
        return;
    };
    let view_end = state.visible_end_idx + CANDLE_HALF_WIDTH + gap;
    let view_start = state
        .view_start
        .unwrap_or(state.visible_start_idx - CANDLE_HALF_WIDTH);
    state.view_end = Some(if view_end <= view_start {
        let range = (state.visible_end_idx - state.visible_start_idx).max(1.0);
        state.visible_end_idx + CANDLE_HALF_WIDTH + range * 0.1
    } else {
        view_end
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_fraction_is_clamped() {
        assert_eq!(clamp_split_fraction(0.02), MIN_SPLIT_FRACTION);
        assert_eq!(clamp_split_fraction(0.95), MAX_SPLIT_FRACTION);
        assert_eq!(clamp_split_fraction(f64::NAN), 0.5);
        assert!((clamp_split_fraction(0.3) - 0.3).abs() <= 1e-12);
    }

    #[test]
    fn collapsed_gap_falls_back_to_tenth_of_range() {
        let mut state = ViewState {
            window_start: 0,
            window_end: 50,
            visible_start_idx: 10.0,
            visible_end_idx: 30.0,
            visible_bars: 21.0,
            view_start: Some(9.5),
            view_end: Some(30.5),
        };
        apply_gaps(&mut state, Some(-40.0), None);
        assert!((state.view_end.expect("end") - 32.5).abs() <= 1e-9);
    }
}
