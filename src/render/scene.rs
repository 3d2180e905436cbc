use serde::{Deserialize, Serialize};

use crate::core::{PaneSide, PriceRange, Timeframe};
use crate::error::{ViewerError, ViewerResult};
use crate::render::{Color, Stroke};

/// Candlestick series of the buffered window, x in bar-index units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleTrace {
    pub x: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    /// Per-candle hover text.
    pub hover: Vec<String>,
    pub hover_enabled: bool,
}

impl CandleTrace {
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceGroup {
    Session,
    SetupBox,
    TradeZone,
    TradeConnector,
}

/// Closed or open polyline in (bar index, price) space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeTrace {
    pub group: TraceGroup,
    pub name: String,
    pub points: Vec<(f64, f64)>,
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
}

impl ShapeTrace {
    pub fn validate(&self) -> ViewerResult<()> {
        if self.points.is_empty() {
            return Err(ViewerError::InvalidData(format!(
                "shape `{}` has no points",
                self.name
            )));
        }
        if self
            .points
            .iter()
            .any(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(ViewerError::InvalidData(format!(
                "shape `{}` has non-finite coordinates",
                self.name
            )));
        }
        if let Some(fill) = self.fill {
            fill.validate()?;
        }
        if let Some(stroke) = self.stroke {
            stroke.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneTrace {
    Candles(CandleTrace),
    Shape(ShapeTrace),
}

/// Time-axis tick as handed to the renderer. Empty label means unlabeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickLabel {
    pub index: i64,
    pub label: String,
    pub emphasized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Margins {
    /// Price axis sits on the outer edge of each pane.
    #[must_use]
    pub fn for_pane(pane: PaneSide) -> Self {
        match pane {
            PaneSide::Left => Self {
                left: 60.0,
                right: 10.0,
                top: 20.0,
                bottom: 40.0,
            },
            PaneSide::Right => Self {
                left: 10.0,
                right: 60.0,
                top: 20.0,
                bottom: 40.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    pub title: String,
    pub x_range: (f64, f64),
    /// `None` lets the renderer autorange.
    pub y_range: Option<PriceRange>,
    pub ticks: Vec<TickLabel>,
    pub hidden_ticks: Vec<i64>,
    /// Indices that get a short tick mark under the axis (labelled ticks only).
    pub tick_marks: Vec<i64>,
    pub price_axis_side: PaneSide,
    pub margins: Margins,
    pub x_fixed: bool,
    pub y_fixed: bool,
}

/// Renderer-agnostic description of one pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub pane: PaneSide,
    pub timeframe: Option<Timeframe>,
    pub traces: Vec<SceneTrace>,
    pub layout: SceneLayout,
    pub no_data: bool,
}

impl Scene {
    /// Placeholder scene for a pane without data.
    #[must_use]
    pub fn no_data(pane: PaneSide, timeframe: Option<Timeframe>, title: impl Into<String>) -> Self {
        Self {
            pane,
            timeframe,
            traces: Vec::new(),
            layout: SceneLayout {
                title: title.into(),
                x_range: (0.0, 1.0),
                y_range: None,
                ticks: Vec::new(),
                hidden_ticks: Vec::new(),
                tick_marks: Vec::new(),
                price_axis_side: pane,
                margins: Margins::for_pane(pane),
                x_fixed: false,
                y_fixed: false,
            },
            no_data: true,
        }
    }

    #[must_use]
    pub fn candles(&self) -> Option<&CandleTrace> {
        self.traces.iter().find_map(|trace| match trace {
            SceneTrace::Candles(candles) => Some(candles),
            SceneTrace::Shape(_) => None,
        })
    }

    pub fn shapes(&self, group: TraceGroup) -> impl Iterator<Item = &ShapeTrace> {
        self.traces.iter().filter_map(move |trace| match trace {
            SceneTrace::Shape(shape) if shape.group == group => Some(shape),
            _ => None,
        })
    }

    pub fn validate(&self) -> ViewerResult<()> {
        let (x0, x1) = self.layout.x_range;
        if !x0.is_finite() || !x1.is_finite() || x1 < x0 {
            return Err(ViewerError::InvalidData(
                "scene x range must be finite and ordered".to_owned(),
            ));
        }
        if let Some((y0, y1)) = self.layout.y_range {
            if !y0.is_finite() || !y1.is_finite() || y1 < y0 {
                return Err(ViewerError::InvalidData(
                    "scene y range must be finite and ordered".to_owned(),
                ));
            }
        }
        for trace in &self.traces {
            match trace {
                SceneTrace::Candles(candles) => {
                    let n = candles.x.len();
                    if candles.open.len() != n
                        || candles.high.len() != n
                        || candles.low.len() != n
                        || candles.close.len() != n
                    {
                        return Err(ViewerError::InvalidData(
                            "candle trace columns must have equal length".to_owned(),
                        ));
                    }
                }
                SceneTrace::Shape(shape) => shape.validate()?,
            }
        }
        Ok(())
    }
}
