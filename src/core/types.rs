use serde::{Deserialize, Serialize};

use crate::error::{ViewerError, ViewerResult};

/// Plot area size in CSS/device pixels as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> ViewerResult<Self> {
        let viewport = Self { width, height };
        if !viewport.is_valid() {
            return Err(ViewerError::InvalidViewport { width, height });
        }
        Ok(viewport)
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// One of the two chart panes.
///
/// The right pane hosts the lower timeframe, the left pane the higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaneSide {
    Left,
    Right,
}

impl PaneSide {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Timeframe class sharing cached viewport memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Minute,
    Hourly,
    Daily,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::Minute, Regime::Hourly, Regime::Daily];
}

/// Inclusive price interval shown on the vertical axis.
pub type PriceRange = (f64, f64);
