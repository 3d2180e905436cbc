use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{PaneBehavior, ViewMode};
use crate::core::{PaneSide, PriceRange, Timeframe};
use crate::error::{ViewerError, ViewerResult};
use crate::extensions::{FeedKind, SetupSortMode};

/// Who caused a viewport change.
///
/// Renderers report the ranges they apply while drawing a committed scene as
/// `System`; those must not be fed back into the view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventOrigin {
    #[default]
    User,
    System,
}

/// Which axes accept drag and zoom input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    #[default]
    Both,
    /// Horizontal only; the price axis is fixed.
    X,
    /// Vertical only; the time axis is fixed.
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupStep {
    Next,
    Previous,
}

/// New axis ranges requested for one pane, in bar-index and price units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportChange {
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<PriceRange>,
}

fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

fn axis_range(object: &serde_json::Map<String, Value>, axis: &str) -> Option<(f64, f64)> {
    let lo = object.get(&format!("{axis}.range[0]"));
    let hi = object.get(&format!("{axis}.range[1]"));
    if let (Some(lo), Some(hi)) = (lo, hi) {
        return Some((number_of(lo)?, number_of(hi)?));
    }
    match object.get(&format!("{axis}.range"))? {
        Value::Array(items) if items.len() == 2 => Some((number_of(&items[0])?, number_of(&items[1])?)),
        _ => None,
    }
}

impl ViewportChange {
    #[must_use]
    pub fn x(start: f64, end: f64) -> Self {
        Self {
            x_range: Some((start, end)),
            y_range: None,
        }
    }

    #[must_use]
    pub fn y(min: f64, max: f64) -> Self {
        Self {
            x_range: None,
            y_range: Some((min, max)),
        }
    }

    #[must_use]
    pub fn with_y_range(mut self, min: f64, max: f64) -> Self {
        self.y_range = Some((min, max));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x_range.is_none() && self.y_range.is_none()
    }

    /// Parses a relayout payload such as `{"xaxis.range[0]": 10.5, "xaxis.range[1]": "90"}`.
    ///
    /// Pairs that are missing or not finite are left out.
    pub fn from_relayout_json(input: &str) -> ViewerResult<Self> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| ViewerError::InvalidData(format!("failed to parse relayout payload: {e}")))?;
        let Value::Object(object) = value else {
            return Err(ViewerError::InvalidData(
                "relayout payload must be a json object".to_owned(),
            ));
        };
        Ok(Self {
            x_range: axis_range(&object, "xaxis"),
            y_range: axis_range(&object, "yaxis"),
        })
    }
}

/// Host input to a viewer session.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    Viewport {
        pane: PaneSide,
        change: ViewportChange,
        origin: EventOrigin,
    },
    SetTimeframe {
        pane: PaneSide,
        timeframe: Timeframe,
    },
    SetViewMode(ViewMode),
    SetPaneBehavior(PaneBehavior),
    SetAxisMode(AxisMode),
    FocusSetup(usize),
    StepSetup(SetupStep),
    ResizePane {
        pane: PaneSide,
        width_px: f64,
        height_px: f64,
    },
    SetShowMisses(bool),
    SetShowSignals(bool),
    SetCandleHover(bool),
    SetSessionDays(u32),
    SetSortMode(SetupSortMode),
    SetSplitFraction(f64),
    FileListing(Vec<String>),
    SelectFeedFile {
        kind: FeedKind,
        filename: Option<String>,
    },
    FeedContent {
        kind: FeedKind,
        filename: String,
        text: String,
    },
    FeedFailure {
        kind: FeedKind,
        filename: String,
    },
    Rerender,
}

/// FIFO of pending commands, drained by the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandQueue {
    pending: VecDeque<ViewerCommand>,
}

impl CommandQueue {
    pub fn push(&mut self, command: ViewerCommand) {
        self.pending.push_back(command);
    }

    pub fn pop(&mut self) -> Option<ViewerCommand> {
        self.pending.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
