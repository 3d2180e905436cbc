mod annotation_controller;
mod annotation_projector;
mod axis_label_format;
mod command_dispatch;
mod observer;
mod pane_sync;
mod persisted_state;
mod scene_builder;
mod session;
mod session_bands;
mod setup_navigation;
mod snapshot;
mod sync_controller;
mod time_axis_ticks;
mod timeframe_controller;
mod view_mode_controller;
mod viewer_config;
mod viewport_events;

pub use annotation_projector::{
    ProjectedBox, ProjectedTrade, ProjectedZone, ProjectionContext, ZoneKind, box_visible_center,
    project_setup_boxes, project_trades,
};
pub use axis_label_format::format_hover_time;
pub use observer::{NoopObserver, ViewerObserver};
pub use pane_sync::{
    FollowState, PaneBehavior, PaneSynchronizer, SnapshotPin, ViewMode, follow_view_state,
    keeps_manual_gap, pinned_view_state, preserved_view_state,
};
pub use persisted_state::{
    PERSISTED_STATE_JSON_SCHEMA_V1, PersistedViewerState, PersistedViewerStateJsonContractV1,
    STORAGE_KEY,
};
pub use scene_builder::{AnnotationLayer, BuiltScene, SceneRequest, build_scene, scene_title};
pub use session::{DisplayToggles, PaneState, ViewerSession};
pub use session_bands::{SessionBand, TradingSession, build_session_bands, pane_shows_session_bands};
pub use snapshot::{SnapshotSeries, build_snapshot_series};
pub use sync_controller::PinOptions;
pub use time_axis_ticks::{AxisTick, TimeTickTuning, TimeTicks, compute_time_ticks};
pub use view_mode_controller::{MAX_SPLIT_FRACTION, MIN_SPLIT_FRACTION, clamp_split_fraction};
pub use viewer_config::{DEFAULT_SESSION_DAYS, MAX_SESSION_DAYS, MIN_SESSION_DAYS, ViewerConfig};
pub use viewport_events::apply_x_range;
