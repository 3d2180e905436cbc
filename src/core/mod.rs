pub mod bar;
pub mod bar_store;
pub mod primitives;
pub mod regime;
pub mod series;
pub mod time_ticks;
pub mod timeframe;
pub mod types;
pub mod vertical_range;
pub mod window;

pub use bar::{Bar, price_extent};
pub use bar_store::BarStore;
pub use regime::{RegimeState, RegimeStates};
pub use series::TimeframeSeries;
pub use time_ticks::{LabelUnit, TickGranularity};
pub use timeframe::Timeframe;
pub use types::{PaneSide, PriceRange, Regime, Viewport};
pub use vertical_range::{CorrectionDirection, VerticalCorrection, auto_range, vertical_correction};
pub use window::{
    CANDLE_HALF_WIDTH, ViewState, WindowTuning, compute_centered, compute_from_time_range,
    compute_from_ts_range, compute_right_anchored,
};
