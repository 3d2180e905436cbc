use serde::{Deserialize, Serialize};

use crate::core::vertical_range::DEFAULT_AUTO_PAN_PADDING_RATIO;
use crate::core::window::{DEFAULT_BUFFER_FACTOR, DEFAULT_VISIBLE_BARS};
use crate::core::{Timeframe, WindowTuning};
use crate::error::{ViewerError, ViewerResult};

use super::TimeTickTuning;
use super::time_axis_ticks::{AXIS_LABEL_COLLISION_RADIUS_PX, AXIS_TIME_TARGET_SPACING_PX};

pub const MIN_SESSION_DAYS: u32 = 3;
pub const MAX_SESSION_DAYS: u32 = 60;
pub const DEFAULT_SESSION_DAYS: u32 = 10;

/// Viewer session bootstrap configuration.
///
/// Serializable so hosts can keep tuning next to their own settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_right_timeframe")]
    pub default_right_timeframe: Timeframe,
    #[serde(default = "default_left_timeframe")]
    pub default_left_timeframe: Timeframe,
    #[serde(default = "default_visible_bars")]
    pub default_visible_bars: i64,
    #[serde(default = "default_buffer_factor")]
    pub buffer_factor: f64,
    /// Lower bound for bar counts after re-anchoring or timeframe scaling.
    #[serde(default = "default_min_reanchor_bars")]
    pub min_reanchor_bars: i64,
    #[serde(default = "default_tick_target_spacing_px")]
    pub tick_target_spacing_px: f64,
    #[serde(default = "default_label_collision_radius_px")]
    pub label_collision_radius_px: f64,
    #[serde(default = "default_max_ticks")]
    pub default_max_ticks: usize,
    #[serde(default = "default_intraday_step_threshold_hours")]
    pub intraday_step_threshold_hours: f64,
    #[serde(default = "default_calendar_preference_days")]
    pub calendar_preference_days: f64,
    #[serde(default = "default_calendar_forced_timeframes")]
    pub calendar_forced_timeframes: Vec<Timeframe>,
    #[serde(default = "default_auto_pan_padding_ratio")]
    pub auto_pan_padding_ratio: f64,
    /// Left-pane lookahead gap, as a share of its visible width, that counts as
    /// a manual gap worth keeping while following.
    #[serde(default = "default_follow_gap_ratio")]
    pub follow_gap_ratio: f64,
    #[serde(default = "default_base_timeframe")]
    pub base_timeframe: Timeframe,
    #[serde(default)]
    pub signal_base_minutes: i64,
    #[serde(default = "default_session_days")]
    pub default_session_days: u32,
    #[serde(default = "default_focus_price_offset_px")]
    pub focus_price_offset_px: f64,
    #[serde(default = "default_plot_height_px")]
    pub default_plot_height_px: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_right_timeframe: default_right_timeframe(),
            default_left_timeframe: default_left_timeframe(),
            default_visible_bars: default_visible_bars(),
            buffer_factor: default_buffer_factor(),
            min_reanchor_bars: default_min_reanchor_bars(),
            tick_target_spacing_px: default_tick_target_spacing_px(),
            label_collision_radius_px: default_label_collision_radius_px(),
            default_max_ticks: default_max_ticks(),
            intraday_step_threshold_hours: default_intraday_step_threshold_hours(),
            calendar_preference_days: default_calendar_preference_days(),
            calendar_forced_timeframes: default_calendar_forced_timeframes(),
            auto_pan_padding_ratio: default_auto_pan_padding_ratio(),
            follow_gap_ratio: default_follow_gap_ratio(),
            base_timeframe: default_base_timeframe(),
            signal_base_minutes: 0,
            default_session_days: default_session_days(),
            focus_price_offset_px: default_focus_price_offset_px(),
            default_plot_height_px: default_plot_height_px(),
        }
    }
}

impl ViewerConfig {
    #[must_use]
    pub fn with_default_timeframes(mut self, right: Timeframe, left: Timeframe) -> Self {
        self.default_right_timeframe = right;
        self.default_left_timeframe = left;
        self
    }

    #[must_use]
    pub fn with_default_visible_bars(mut self, bars: i64) -> Self {
        self.default_visible_bars = bars;
        self
    }

    #[must_use]
    pub fn with_buffer_factor(mut self, factor: f64) -> Self {
        self.buffer_factor = factor;
        self
    }

    /// Sets the pixel radius inside which a lower-rank time label is hidden.
    #[must_use]
    pub fn with_label_collision_radius_px(mut self, radius_px: f64) -> Self {
        self.label_collision_radius_px = radius_px;
        self
    }

    #[must_use]
    pub fn with_auto_pan_padding_ratio(mut self, ratio: f64) -> Self {
        self.auto_pan_padding_ratio = ratio;
        self
    }

    #[must_use]
    pub fn with_follow_gap_ratio(mut self, ratio: f64) -> Self {
        self.follow_gap_ratio = ratio;
        self
    }

    #[must_use]
    pub fn with_base_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.base_timeframe = timeframe;
        self
    }

    #[must_use]
    pub fn with_signal_base_minutes(mut self, minutes: i64) -> Self {
        self.signal_base_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_default_session_days(mut self, days: u32) -> Self {
        self.default_session_days = days;
        self
    }

    pub fn validate(&self) -> ViewerResult<()> {
        if self.default_visible_bars < 1 {
            return Err(ViewerError::InvalidData(
                "default visible bars must be >= 1".to_owned(),
            ));
        }
        if self.min_reanchor_bars < 1 {
            return Err(ViewerError::InvalidData(
                "min re-anchor bars must be >= 1".to_owned(),
            ));
        }
        if !self.buffer_factor.is_finite() || self.buffer_factor < 1.0 {
            return Err(ViewerError::InvalidData(
                "buffer factor must be finite and >= 1".to_owned(),
            ));
        }
        for (name, value) in [
            ("tick target spacing", self.tick_target_spacing_px),
            ("focus price offset", self.focus_price_offset_px),
            ("default plot height", self.default_plot_height_px),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ViewerError::InvalidData(format!(
                    "{name} must be finite and > 0"
                )));
            }
        }
        for (name, value) in [
            ("label collision radius", self.label_collision_radius_px),
            ("auto-pan padding ratio", self.auto_pan_padding_ratio),
            ("follow gap ratio", self.follow_gap_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ViewerError::InvalidData(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        if self.default_max_ticks < 2 {
            return Err(ViewerError::InvalidData(
                "default max ticks must be >= 2".to_owned(),
            ));
        }
        if self.signal_base_minutes < 0 {
            return Err(ViewerError::InvalidData(
                "signal base minutes must be >= 0".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn window_tuning(&self) -> WindowTuning {
        WindowTuning {
            default_visible_bars: self.default_visible_bars,
            buffer_factor: self.buffer_factor,
        }
    }

    #[must_use]
    pub fn tick_tuning(&self) -> TimeTickTuning {
        TimeTickTuning {
            target_spacing_px: self.tick_target_spacing_px,
            collision_radius_px: self.label_collision_radius_px,
            default_max_ticks: self.default_max_ticks,
            intraday_threshold_hours: self.intraday_step_threshold_hours,
            calendar_preference_days: self.calendar_preference_days,
            calendar_forced: self.calendar_forced_timeframes.clone(),
        }
    }

    /// Session day count clamped to the drawable range.
    #[must_use]
    pub fn clamp_session_days(days: u32) -> u32 {
        days.clamp(MIN_SESSION_DAYS, MAX_SESSION_DAYS)
    }

    pub fn to_json_pretty(&self) -> ViewerResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ViewerError::InvalidData(format!("failed to serialize config: {e}")))
    }

    pub fn from_json_str(input: &str) -> ViewerResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| ViewerError::InvalidData(format!("failed to parse config: {e}")))
    }
}

fn default_right_timeframe() -> Timeframe {
    Timeframe::M5
}

fn default_left_timeframe() -> Timeframe {
    Timeframe::H1
}

fn default_visible_bars() -> i64 {
    DEFAULT_VISIBLE_BARS
}

fn default_buffer_factor() -> f64 {
    DEFAULT_BUFFER_FACTOR
}

fn default_min_reanchor_bars() -> i64 {
    10
}

fn default_tick_target_spacing_px() -> f64 {
    AXIS_TIME_TARGET_SPACING_PX
}

fn default_label_collision_radius_px() -> f64 {
    AXIS_LABEL_COLLISION_RADIUS_PX
}

fn default_max_ticks() -> usize {
    TimeTickTuning::default().default_max_ticks
}

fn default_intraday_step_threshold_hours() -> f64 {
    TimeTickTuning::default().intraday_threshold_hours
}

fn default_calendar_preference_days() -> f64 {
    TimeTickTuning::default().calendar_preference_days
}

fn default_calendar_forced_timeframes() -> Vec<Timeframe> {
    TimeTickTuning::default().calendar_forced
}

fn default_auto_pan_padding_ratio() -> f64 {
    DEFAULT_AUTO_PAN_PADDING_RATIO
}

fn default_follow_gap_ratio() -> f64 {
    0.10
}

fn default_base_timeframe() -> Timeframe {
    Timeframe::M1
}

fn default_session_days() -> u32 {
    DEFAULT_SESSION_DAYS
}

fn default_focus_price_offset_px() -> f64 {
    100.0
}

fn default_plot_height_px() -> f64 {
    600.0
}
