use chrono::NaiveDate;
use tracing::debug;

use crate::core::primitives::{parse_display_time, trading_date_of};
use crate::core::{PaneSide, PriceRange, TimeframeSeries, auto_range, compute_centered};
use crate::error::ViewerResult;
use crate::extensions::{Direction, Setup, SetupBox, SetupSortMode};
use crate::interaction::SetupStep;
use crate::render::SceneRenderer;

use super::session::RenderOptions;
use super::sync_controller::PinOptions;
use super::viewer_config::ViewerConfig;
use super::{ViewMode, ViewerSession};

/// Trading-day time the right pane centres on when focusing a setup.
const FOCUS_SESSION_TIME: &str = "10:00:00";

/// Lowest low and highest high of the bars inside the setup's box, falling back
/// to every bar of the setup's trading date.
fn setup_price_extent(series: &TimeframeSeries, setup: &Setup, setup_box: Option<&SetupBox>) -> Option<PriceRange> {
    let fold = |acc: Option<PriceRange>, (low, high): (f64, f64)| {
        Some(acc.map_or((low, high), |(lo, hi)| (lo.min(low), hi.max(high))))
    };

    let in_box = setup_box.and_then(|b| {
        let (t_min, t_max) = (b.top_ts.min(b.bottom_ts), b.top_ts.max(b.bottom_ts));
        series
            .bars()
            .iter()
            .skip_while(|bar| bar.ts < t_min)
            .take_while(|bar| bar.ts <= t_max)
            .map(|bar| (bar.l, bar.h))
            .fold(None, fold)
    });
    if in_box.is_some() {
        return in_box;
    }
    let target = NaiveDate::parse_from_str(&setup.date_ny, "%Y-%m-%d").ok()?;
    series
        .bars()
        .iter()
        .filter(|bar| trading_date_of(bar.ts) == Some(target))
        .map(|bar| (bar.l, bar.h))
        .fold(None, fold)
}

/// Shifts `range` so the setup's extreme sits `delta` inside the relevant edge.
fn focus_y_range(range: PriceRange, direction: Direction, extent: Option<PriceRange>, delta: f64) -> PriceRange {
    let height = range.1 - range.0;
    match (direction, extent) {
        (Direction::Buy, Some((low, _))) => (low - delta, low - delta + height),
        (Direction::Sell, Some((_, high))) => (high + delta - height, high + delta),
        _ => range,
    }
}

impl<R: SceneRenderer> ViewerSession<R> {
    /// Centres the right pane on a setup and pins the left-pane snapshot to it.
    ///
    /// The Y-range keeps its height and is shifted so the box low (buys) or
    /// high (sells) sits a fixed pixel offset from the plot edge. Unknown setup
    /// ids are ignored.
    pub fn focus_on_setup(&mut self, setup_id: usize) -> ViewerResult<()> {
        let Some(setup) = self.annotations.setup(setup_id).cloned() else {
            debug!(setup_id, "focus ignored; unknown setup");
            return Ok(());
        };
        let tf = self.right_tf;
        let Some(series) = self.store.non_empty(tf) else {
            return Ok(());
        };

        let tuning = self.config.window_tuning();
        let anchor_ts = if setup.date_ny.is_empty() {
            Some(setup.signal_ts)
        } else {
            parse_display_time(&format!("{} {FOCUS_SESSION_TIME}", setup.date_ny))
        };
        let anchor_idx = anchor_ts
            .and_then(|ts| series.find_pos_le(ts).or_else(|| series.find_pos_ge(ts)))
            .and_then(|pos| series.bar_at_pos(pos))
            .or_else(|| series.last())
            .map_or(series.max_idx(), |bar| bar.i);

        let visible_bars = self
            .right
            .view(tf)
            .map(|state| state.visible_bars)
            .filter(|bars| *bars > 0.0)
            .unwrap_or(tuning.default_visible_bars as f64);
        let state = compute_centered(series, visible_bars, Some(anchor_idx as f64), tuning);

        let base_range = self
            .regime_y_range(PaneSide::Right)
            .or_else(|| auto_range(series, &state))
            .filter(|(lo, hi)| hi - lo > 0.0);
        let options = match base_range {
            Some(range) => {
                let plot_height = self
                    .right
                    .size
                    .map(|size| size.height)
                    .filter(|h| *h > 0.0)
                    .unwrap_or(self.config.default_plot_height_px);
                let delta = (range.1 - range.0) / plot_height * self.config.focus_price_offset_px;
                let extent = setup_price_extent(series, &setup, self.annotations.setup_box(&setup));
                RenderOptions::fixed(Some(focus_y_range(range, setup.direction, extent, delta)))
            }
            None => RenderOptions::auto(),
        };

        debug!(setup_id, timeframe = %tf, anchor_idx, "focus on setup");
        self.set_focus_cutoff(Some(setup_id));
        self.commit_pane(PaneSide::Right, tf, state, options)?;

        if self.view_mode == ViewMode::Split && self.sync.behavior.allows_pinned_snapshot() {
            self.pin_snapshot_for_setup(setup_id, PinOptions::default())?;
        } else {
            self.clear_snapshot(false);
        }
        self.set_selected_setup(Some(setup_id));
        Ok(())
    }

    /// Focuses the next or previous setup in the current sort order.
    ///
    /// Without a selection, `Next` starts at the first setup and `Previous`
    /// at the last. Stepping past either end stays put.
    pub fn step_setup(&mut self, step: SetupStep) -> ViewerResult<()> {
        let ordered: Vec<usize> = self
            .annotations
            .sorted_setups(self.sort_mode)
            .into_iter()
            .map(|setup| setup.id)
            .collect();
        if ordered.is_empty() {
            return Ok(());
        }
        let current = self
            .selected_setup
            .and_then(|id| ordered.iter().position(|candidate| *candidate == id));
        let target = match (step, current) {
            (SetupStep::Next, None) => Some(0),
            (SetupStep::Previous, None) => Some(ordered.len() - 1),
            (SetupStep::Next, Some(pos)) => Some(pos + 1).filter(|next| *next < ordered.len()),
            (SetupStep::Previous, Some(pos)) => pos.checked_sub(1),
        };
        match target.and_then(|pos| ordered.get(pos)) {
            Some(id) => self.focus_on_setup(*id),
            None => Ok(()),
        }
    }

    pub fn set_sort_mode(&mut self, mode: SetupSortMode) {
        self.sort_mode = mode;
    }

    /// Shows or hides missed trades; the setup list is rebuilt to match.
    pub fn set_show_misses(&mut self, show: bool) -> ViewerResult<()> {
        if self.toggles.show_misses == show {
            return Ok(());
        }
        self.toggles.show_misses = show;
        self.annotations.rebuild_setups(show);
        if let Some(id) = self.selected_setup {
            if self.annotations.setup(id).is_none() {
                self.set_selected_setup(None);
            }
        }
        self.rerender_all()
    }

    pub fn set_show_signals(&mut self, show: bool) -> ViewerResult<()> {
        if self.toggles.show_signals == show {
            return Ok(());
        }
        self.toggles.show_signals = show;
        self.rerender_all()
    }

    pub fn set_candle_hover(&mut self, enabled: bool) -> ViewerResult<()> {
        if self.toggles.candle_hover == enabled {
            return Ok(());
        }
        self.toggles.candle_hover = enabled;
        self.rerender_all()
    }

    /// Number of trading days that get session bands, clamped to `[3, 60]`.
    pub fn set_session_days(&mut self, days: u32) -> ViewerResult<()> {
        let days = ViewerConfig::clamp_session_days(days);
        if self.session_days == days {
            return Ok(());
        }
        self.session_days = days;
        self.rerender_all()
    }
}
