use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PaneSide, RegimeStates, Timeframe, ViewState};
use crate::error::{ViewerError, ViewerResult};
use crate::extensions::SetupSortMode;
use crate::interaction::AxisMode;
use crate::render::SceneRenderer;

use super::view_mode_controller::clamp_split_fraction;
use super::{PaneBehavior, ViewMode, ViewerConfig, ViewerSession};

/// Key the host stores [`PersistedViewerState`] under.
pub const STORAGE_KEY: &str = "m1_mx_dynamic_viewer_state_v1";
pub const PERSISTED_STATE_JSON_SCHEMA_V1: u32 = 1;

/// Everything a viewer restores on reload.
///
/// Field names match the storage format written by earlier viewers, so a
/// saved payload stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedViewerState {
    pub current_tf: Option<Timeframe>,
    pub current_tf_left: Option<Timeframe>,
    pub axis_mode: AxisMode,
    pub candle_hover_on: bool,
    pub session_days: u32,
    #[serde(rename = "REGIME_STATE")]
    pub regime_state: RegimeStates,
    #[serde(rename = "REGIME_STATE_LEFT")]
    pub regime_state_left: RegimeStates,
    #[serde(rename = "TF_STATE")]
    pub tf_state: BTreeMap<Timeframe, ViewState>,
    #[serde(rename = "TF_STATE_LEFT")]
    pub tf_state_left: BTreeMap<Timeframe, ViewState>,
    #[serde(rename = "SHOW_MISSES")]
    pub show_misses: bool,
    #[serde(rename = "SHOW_SIGNALS")]
    pub show_signals: bool,
    #[serde(rename = "SETUP_SORT_MODE")]
    pub setup_sort_mode: SetupSortMode,
    #[serde(rename = "VIEW_MODE")]
    pub view_mode: ViewMode,
    #[serde(rename = "htfBehavior")]
    pub pane_behavior: PaneBehavior,
    #[serde(rename = "splitterLeftFraction")]
    pub split_fraction: f64,
}

impl Default for PersistedViewerState {
    fn default() -> Self {
        Self {
            current_tf: None,
            current_tf_left: None,
            axis_mode: AxisMode::Both,
            candle_hover_on: false,
            session_days: super::viewer_config::DEFAULT_SESSION_DAYS,
            regime_state: RegimeStates::default(),
            regime_state_left: RegimeStates::default(),
            tf_state: BTreeMap::new(),
            tf_state_left: BTreeMap::new(),
            show_misses: true,
            show_signals: true,
            setup_sort_mode: SetupSortMode::default(),
            view_mode: ViewMode::default(),
            pane_behavior: PaneBehavior::default(),
            split_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedViewerStateJsonContractV1 {
    pub schema_version: u32,
    pub state: PersistedViewerState,
}

impl PersistedViewerState {
    pub fn to_json_pretty(&self) -> ViewerResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ViewerError::InvalidData(format!("failed to serialize viewer state: {e}")))
    }

    pub fn to_json_contract_v1_pretty(&self) -> ViewerResult<String> {
        let payload = PersistedViewerStateJsonContractV1 {
            schema_version: PERSISTED_STATE_JSON_SCHEMA_V1,
            state: self.clone(),
        };
        serde_json::to_string_pretty(&payload).map_err(|e| {
            ViewerError::InvalidData(format!("failed to serialize viewer state contract v1: {e}"))
        })
    }

    /// Accepts both the bare storage payload and the versioned contract.
    pub fn from_json_compat_str(input: &str) -> ViewerResult<Self> {
        if let Ok(payload) = serde_json::from_str::<PersistedViewerStateJsonContractV1>(input) {
            if payload.schema_version != PERSISTED_STATE_JSON_SCHEMA_V1 {
                return Err(ViewerError::InvalidData(format!(
                    "unsupported viewer state schema version: {}",
                    payload.schema_version
                )));
            }
            return Ok(payload.state);
        }
        serde_json::from_str::<Self>(input)
            .map_err(|e| ViewerError::InvalidData(format!("failed to parse viewer state json: {e}")))
    }
}

impl<R: SceneRenderer> ViewerSession<R> {
    /// Current state in its persisted shape.
    #[must_use]
    pub fn persisted_state(&self) -> PersistedViewerState {
        PersistedViewerState {
            current_tf: Some(self.right_tf),
            current_tf_left: Some(self.left_tf),
            axis_mode: self.axis_mode,
            candle_hover_on: self.toggles.candle_hover,
            session_days: self.session_days,
            regime_state: self.right.regimes.clone(),
            regime_state_left: self.left.regimes.clone(),
            tf_state: self.right.views.clone(),
            tf_state_left: self.left.views.clone(),
            show_misses: self.toggles.show_misses,
            show_signals: self.toggles.show_signals,
            setup_sort_mode: self.sort_mode,
            view_mode: self.view_mode,
            pane_behavior: self.sync.behavior,
            split_fraction: self.split_fraction,
        }
    }

    /// Applies a saved state without rendering; call [`Self::rerender_all`] afterwards.
    ///
    /// Timeframes missing from the store or not allowed on their pane are
    /// ignored, the axis lock resets to `both` and snapshots are dropped.
    pub fn restore_persisted_state(&mut self, saved: PersistedViewerState) {
        let store = &self.store;
        let usable = |tf: &Timeframe, pane: PaneSide| store.contains(*tf) && tf.allowed_on(pane);
        if let Some(tf) = saved.current_tf.filter(|tf| usable(tf, PaneSide::Right)) {
            self.right_tf = tf;
        }
        if let Some(tf) = saved.current_tf_left.filter(|tf| usable(tf, PaneSide::Left)) {
            self.left_tf = tf;
        }
        let right_views: Vec<(Timeframe, ViewState)> = saved
            .tf_state
            .into_iter()
            .filter(|(tf, _)| usable(tf, PaneSide::Right))
            .collect();
        let left_views: Vec<(Timeframe, ViewState)> = saved
            .tf_state_left
            .into_iter()
            .filter(|(tf, _)| usable(tf, PaneSide::Left))
            .collect();
        let restored_views = right_views.len() + left_views.len();
        self.right.views.extend(right_views);
        self.left.views.extend(left_views);
        self.right.regimes = saved.regime_state;
        self.left.regimes = saved.regime_state_left;

        self.axis_mode = AxisMode::Both;
        self.toggles.candle_hover = saved.candle_hover_on;
        self.toggles.show_signals = saved.show_signals;
        if self.toggles.show_misses != saved.show_misses {
            self.toggles.show_misses = saved.show_misses;
            self.annotations.rebuild_setups(saved.show_misses);
        }
        self.session_days = ViewerConfig::clamp_session_days(saved.session_days);
        self.sort_mode = saved.setup_sort_mode;
        self.view_mode = saved.view_mode;
        self.sync.behavior = saved.pane_behavior;
        self.split_fraction = clamp_split_fraction(saved.split_fraction);

        self.clear_snapshot(true);
        self.sync.clear_follow();
        debug!(
            right = %self.right_tf,
            left = %self.left_tf,
            views = restored_views,
            view_mode = ?self.view_mode,
            "viewer state restored"
        );
    }
}
