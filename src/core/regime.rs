use serde::{Deserialize, Serialize};

use crate::core::timeframe::Timeframe;
use crate::core::types::{PriceRange, Regime};

/// Viewport memory shared by all timeframes of one regime on one pane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegimeState {
    pub initialized: bool,
    /// Display timestamps of the first and last visible bar.
    pub time_range: Option<(String, String)>,
    pub y_range: Option<PriceRange>,
    /// Display timestamp of the last visible bar.
    pub anchor_time: Option<String>,
    pub visible_bars_hint: Option<f64>,
    pub last_tf: Option<Timeframe>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeStates {
    pub minute: RegimeState,
    pub hourly: RegimeState,
    pub daily: RegimeState,
}

impl RegimeStates {
    #[must_use]
    pub fn get(&self, regime: Regime) -> &RegimeState {
        match regime {
            Regime::Minute => &self.minute,
            Regime::Hourly => &self.hourly,
            Regime::Daily => &self.daily,
        }
    }

    pub fn get_mut(&mut self, regime: Regime) -> &mut RegimeState {
        match regime {
            Regime::Minute => &mut self.minute,
            Regime::Hourly => &mut self.hourly,
            Regime::Daily => &mut self.daily,
        }
    }
}
