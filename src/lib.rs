//! replay-chart: view-window and coordinate-mapping core of a dual-pane
//! backtest replay viewer.
//!
//! The crate turns loaded OHLC series, backtest annotations and viewport
//! events into renderer-agnostic scenes for a lower-timeframe pane and a
//! higher-timeframe pane that can follow or snapshot it.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod interaction;
pub mod render;
pub mod telemetry;

pub use api::{PersistedViewerState, ViewerConfig, ViewerSession};
pub use error::{ViewerError, ViewerResult};
