use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::core::{
    BarStore, PaneSide, PriceRange, RegimeState, RegimeStates, Timeframe, TimeframeSeries,
    ViewState, Viewport, compute_centered, compute_right_anchored,
};
use crate::error::ViewerResult;
use crate::extensions::{AnnotationFeedTracker, AnnotationSet, SetupSortMode};
use crate::interaction::AxisMode;
use crate::render::SceneRenderer;

use super::scene_builder::{AnnotationLayer, SceneRequest, build_scene};
use super::{NoopObserver, PaneBehavior, PaneSynchronizer, ViewMode, ViewerConfig, ViewerObserver};

/// Preferred timeframes for sizing setup boxes, finest signal timeframes first.
const ANNOTATION_BASE_ORDER: [Timeframe; 5] = [
    Timeframe::M5,
    Timeframe::M1,
    Timeframe::M3,
    Timeframe::M15,
    Timeframe::H1,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayToggles {
    pub show_misses: bool,
    pub show_signals: bool,
    pub candle_hover: bool,
}

impl Default for DisplayToggles {
    fn default() -> Self {
        Self {
            show_misses: true,
            show_signals: true,
            candle_hover: false,
        }
    }
}

/// Per-pane view memory: one view state per timeframe and one regime cache per regime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneState {
    pub(super) views: BTreeMap<Timeframe, ViewState>,
    pub(super) regimes: RegimeStates,
    pub(super) size: Option<Viewport>,
}

impl PaneState {
    #[must_use]
    pub fn view(&self, timeframe: Timeframe) -> Option<&ViewState> {
        self.views.get(&timeframe)
    }

    #[must_use]
    pub fn views(&self) -> &BTreeMap<Timeframe, ViewState> {
        &self.views
    }

    #[must_use]
    pub fn regimes(&self) -> &RegimeStates {
        &self.regimes
    }

    #[must_use]
    pub fn size(&self) -> Option<Viewport> {
        self.size
    }
}

/// How the vertical range of a committed render is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(super) struct RenderOptions {
    pub(super) auto_y: bool,
    pub(super) y_override: Option<PriceRange>,
}

impl RenderOptions {
    pub(super) fn auto() -> Self {
        Self {
            auto_y: true,
            y_override: None,
        }
    }

    pub(super) fn fixed(y_range: Option<PriceRange>) -> Self {
        Self {
            auto_y: false,
            y_override: y_range,
        }
    }
}

/// First timeframe from `order` (then the store's own order) with bars.
pub(super) fn first_available(store: &BarStore, order: &[Timeframe]) -> Option<Timeframe> {
    order
        .iter()
        .copied()
        .chain(store.timeframes())
        .find(|tf| store.non_empty(*tf).is_some())
}

/// Dual-pane viewer context.
///
/// Owns the bar store, per-pane view memory, annotations and synchronizer
/// state, and commits one scene per pane to the renderer on every change.
pub struct ViewerSession<R: SceneRenderer> {
    pub(super) renderer: R,
    pub(super) observer: Box<dyn ViewerObserver>,
    pub(super) config: ViewerConfig,
    pub(super) store: BarStore,
    pub(super) right_tf: Timeframe,
    pub(super) left_tf: Timeframe,
    pub(super) view_mode: ViewMode,
    pub(super) axis_mode: AxisMode,
    pub(super) right: PaneState,
    pub(super) left: PaneState,
    pub(super) annotations: AnnotationSet,
    pub(super) sync: PaneSynchronizer,
    pub(super) selected_setup: Option<usize>,
    pub(super) toggles: DisplayToggles,
    pub(super) session_days: u32,
    pub(super) sort_mode: SetupSortMode,
    pub(super) feeds: AnnotationFeedTracker,
    pub(super) split_fraction: f64,
}

impl<R: SceneRenderer> ViewerSession<R> {
    /// Creates a session over a loaded store. Nothing is rendered until
    /// [`Self::init_default_views`] or a command runs.
    pub fn new(renderer: R, store: BarStore, config: ViewerConfig) -> ViewerResult<Self> {
        config.validate()?;

        let right_tf = Some(config.default_right_timeframe)
            .filter(|tf| store.contains(*tf))
            .or_else(|| {
                store
                    .timeframes()
                    .find(|tf| tf.allowed_on(PaneSide::Right))
            })
            .unwrap_or(config.default_right_timeframe);
        let left_tf = Some(config.default_left_timeframe)
            .filter(|tf| store.contains(*tf))
            .or_else(|| store.timeframes().find(|tf| tf.allowed_on(PaneSide::Left)))
            .unwrap_or(config.default_left_timeframe);
        let session_days = config.default_session_days;

        debug!(
            right = %right_tf,
            left = %left_tf,
            timeframes = store.timeframes().count(),
            "viewer session created"
        );

        Ok(Self {
            renderer,
            observer: Box::new(NoopObserver),
            config,
            store,
            right_tf,
            left_tf,
            view_mode: ViewMode::default(),
            axis_mode: AxisMode::default(),
            right: PaneState::default(),
            left: PaneState::default(),
            annotations: AnnotationSet::default(),
            sync: PaneSynchronizer::default(),
            selected_setup: None,
            toggles: DisplayToggles::default(),
            session_days,
            sort_mode: SetupSortMode::default(),
            feeds: AnnotationFeedTracker::default(),
            split_fraction: 0.5,
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn ViewerObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &BarStore {
        &self.store
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[must_use]
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    #[must_use]
    pub fn timeframe(&self, pane: PaneSide) -> Timeframe {
        match pane {
            PaneSide::Left => self.left_tf,
            PaneSide::Right => self.right_tf,
        }
    }

    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    #[must_use]
    pub fn axis_mode(&self) -> AxisMode {
        self.axis_mode
    }

    #[must_use]
    pub fn pane_behavior(&self) -> PaneBehavior {
        self.sync.behavior
    }

    #[must_use]
    pub fn pane(&self, pane: PaneSide) -> &PaneState {
        match pane {
            PaneSide::Left => &self.left,
            PaneSide::Right => &self.right,
        }
    }

    pub(super) fn pane_mut(&mut self, pane: PaneSide) -> &mut PaneState {
        match pane {
            PaneSide::Left => &mut self.left,
            PaneSide::Right => &mut self.right,
        }
    }

    /// View state of the pane's current timeframe.
    #[must_use]
    pub fn current_view(&self, pane: PaneSide) -> Option<&ViewState> {
        self.pane(pane).view(self.timeframe(pane))
    }

    /// Regime cache of the pane's current timeframe.
    #[must_use]
    pub fn current_regime(&self, pane: PaneSide) -> &RegimeState {
        let tf = self.timeframe(pane);
        self.pane(pane).regimes.get(tf.regime(pane))
    }

    #[must_use]
    pub fn synchronizer(&self) -> &PaneSynchronizer {
        &self.sync
    }

    #[must_use]
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    #[must_use]
    pub fn selected_setup(&self) -> Option<usize> {
        self.selected_setup
    }

    #[must_use]
    pub fn toggles(&self) -> DisplayToggles {
        self.toggles
    }

    #[must_use]
    pub fn session_days(&self) -> u32 {
        self.session_days
    }

    #[must_use]
    pub fn sort_mode(&self) -> SetupSortMode {
        self.sort_mode
    }

    #[must_use]
    pub fn feeds(&self) -> &AnnotationFeedTracker {
        &self.feeds
    }

    #[must_use]
    pub fn split_fraction(&self) -> f64 {
        self.split_fraction
    }

    /// Series a pane draws for `timeframe`; the left pane prefers its snapshot.
    #[must_use]
    pub fn pane_series(&self, pane: PaneSide, timeframe: Timeframe) -> Option<&TimeframeSeries> {
        match pane {
            PaneSide::Left => self
                .sync
                .left_series(timeframe)
                .or_else(|| self.store.non_empty(timeframe)),
            PaneSide::Right => self.store.non_empty(timeframe),
        }
    }

    /// Finest series used to build partial snapshot bars.
    pub(super) fn snapshot_base(&self) -> Option<&TimeframeSeries> {
        self.store
            .non_empty(self.config.base_timeframe)
            .or_else(|| self.store.finest_timeframe().and_then(|tf| self.store.non_empty(tf)))
    }

    pub(super) fn regime_y_range(&self, pane: PaneSide) -> Option<PriceRange> {
        self.current_regime(pane).y_range
    }

    pub(super) fn set_selected_setup(&mut self, setup_id: Option<usize>) {
        if self.selected_setup != setup_id {
            self.selected_setup = setup_id;
            self.observer.setup_selection_changed(setup_id);
        }
    }

    /// Builds and commits the scene of `pane` for `state`, then folds the
    /// result back into the view and regime caches.
    ///
    /// A timeframe without bars is a logged no-op.
    pub(super) fn commit_pane(
        &mut self,
        pane: PaneSide,
        timeframe: Timeframe,
        state: ViewState,
        options: RenderOptions,
    ) -> ViewerResult<()> {
        let Self {
            renderer,
            config,
            store,
            sync,
            annotations,
            left,
            right,
            toggles,
            axis_mode,
            session_days,
            ..
        } = self;

        let series = match pane {
            PaneSide::Left => sync.left_series(timeframe).or_else(|| store.non_empty(timeframe)),
            PaneSide::Right => store.non_empty(timeframe),
        };
        let Some(series) = series else {
            warn!(pane = pane.as_str(), timeframe = %timeframe, "no bars for timeframe; render skipped");
            return Ok(());
        };
        let pane_state = match pane {
            PaneSide::Left => left,
            PaneSide::Right => right,
        };
        let regime = timeframe.regime(pane);
        let y_range = options.y_override.or_else(|| {
            (!options.auto_y)
                .then(|| pane_state.regimes.get(regime).y_range)
                .flatten()
        });

        let base = first_available(store, &ANNOTATION_BASE_ORDER).and_then(|tf| store.non_empty(tf));
        let cutoff_ts = match pane {
            PaneSide::Left => sync.cutoff_ts(),
            PaneSide::Right => None,
        };
        let built = build_scene(
            SceneRequest {
                pane,
                series,
                state: &state,
                y_range,
                auto_y: options.auto_y,
                chart_width_px: pane_state.size.map(|size| size.width),
                symbol: store.symbol(),
                axis_mode: *axis_mode,
                hover_enabled: toggles.candle_hover,
                session_days: *session_days,
                annotations: Some(AnnotationLayer {
                    boxes: &mut annotations.boxes,
                    trades: &annotations.trades,
                    base,
                    cutoff_ts,
                    signal_base_minutes: config.signal_base_minutes,
                    show_signals: toggles.show_signals,
                    show_misses: toggles.show_misses,
                }),
            },
            &config.tick_tuning(),
        );

        let visible_bars = state.visible_bars;
        pane_state.views.insert(timeframe, state);
        let cache = pane_state.regimes.get_mut(regime);
        if let Some((first, last)) = built.visible_time_range {
            cache.anchor_time = Some(last.clone());
            cache.time_range = Some((first, last));
        }
        if let Some(used) = built.used_y_range {
            cache.y_range = Some(used);
        }
        cache.visible_bars_hint = Some(visible_bars);
        cache.last_tf = Some(timeframe);
        if options.auto_y {
            cache.initialized = true;
        }

        renderer.commit(&built.scene)?;

        let persisted = self.persisted_state();
        self.observer.state_persisted(&persisted);
        Ok(())
    }

    /// Right-anchored default view on the last bar.
    pub(super) fn default_view(&self, pane: PaneSide) -> Option<ViewState> {
        let tf = self.timeframe(pane);
        let series = self.pane_series(pane, tf)?;
        let tuning = self.config.window_tuning();
        Some(compute_right_anchored(
            series,
            tuning.default_visible_bars as f64,
            Some(series.max_idx() as f64),
            tuning,
        ))
    }

    /// Renders the default views: the right pane, plus the left pane in split mode.
    pub fn init_default_views(&mut self) -> ViewerResult<()> {
        if let Some(state) = self.default_view(PaneSide::Right) {
            self.commit_pane(PaneSide::Right, self.right_tf, state, RenderOptions::auto())?;
        }
        if self.view_mode == ViewMode::Split {
            self.init_default_left()?;
        }
        Ok(())
    }

    pub(super) fn init_default_left(&mut self) -> ViewerResult<()> {
        if self.store.non_empty(self.left_tf).is_none() {
            let Some(fallback) = self.store.first_timeframe() else {
                return Ok(());
            };
            self.left_tf = fallback;
        }
        if let Some(state) = self.default_view(PaneSide::Left) {
            self.commit_pane(PaneSide::Left, self.left_tf, state, RenderOptions::auto())?;
        }
        Ok(())
    }

    /// Re-renders both panes from their stored views with the regime Y-ranges.
    pub fn rerender_all(&mut self) -> ViewerResult<()> {
        self.rerender_pane(PaneSide::Right)?;
        if self.view_mode == ViewMode::Split {
            self.rerender_pane(PaneSide::Left)?;
        }
        Ok(())
    }

    pub(super) fn rerender_pane(&mut self, pane: PaneSide) -> ViewerResult<()> {
        let tf = self.timeframe(pane);
        let state = match self.pane(pane).view(tf) {
            Some(state) => state.clone(),
            None => {
                let Some(series) = self.pane_series(pane, tf) else {
                    return Ok(());
                };
                let tuning = self.config.window_tuning();
                compute_centered(series, tuning.default_visible_bars as f64, None, tuning)
            }
        };
        let y_range = self.regime_y_range(pane);
        self.commit_pane(pane, tf, state, RenderOptions::fixed(y_range))
    }

    /// Stored view of the pane's timeframe, else its right-anchored default.
    pub(super) fn view_or_default(&self, pane: PaneSide) -> Option<ViewState> {
        self.current_view(pane)
            .cloned()
            .or_else(|| self.default_view(pane))
    }

    /// Sets the pixel size of a pane. Used for tick density and price offsets.
    pub fn set_pane_size(&mut self, pane: PaneSide, width_px: f64, height_px: f64) -> ViewerResult<()> {
        let size = Viewport::new(width_px, height_px)?;
        self.pane_mut(pane).size = Some(size);
        Ok(())
    }
}
