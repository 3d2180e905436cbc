use tracing::trace;

use crate::core::{PaneSide, PriceRange, Timeframe, TimeframeSeries, ViewState, auto_range};
use crate::extensions::{Direction, SetupBox, Trade};
use crate::interaction::AxisMode;
use crate::render::{
    CandleTrace, Color, LineDash, Margins, Scene, SceneLayout, SceneTrace, ShapeTrace, Stroke,
    TickLabel, TraceGroup,
};

use super::annotation_projector::{
    ProjectedBox, ProjectedTrade, ProjectionContext, ZoneKind, project_setup_boxes, project_trades,
};
use super::axis_label_format::format_hover_time;
use super::session_bands::build_session_bands;
use super::{TimeTickTuning, compute_time_ticks};

const STOP_ZONE_FILL: Color = Color::rgba8(8, 153, 129, 0.15);
const TARGET_ZONE_FILL: Color = Color::rgba8(67, 70, 81, 0.15);
const CONNECTOR_COLOR: Color = Color::rgba8(49, 27, 146, 1.0);
const BUY_BOX_COLOR: Color = Color::rgba(0.0, 0.0, 1.0, 0.9);
const SELL_BOX_COLOR: Color = Color::rgba(1.0, 0.0, 0.0, 0.9);

/// Annotation inputs of one pane render.
#[derive(Debug)]
pub struct AnnotationLayer<'a> {
    pub boxes: &'a mut [SetupBox],
    pub trades: &'a [Trade],
    pub base: Option<&'a TimeframeSeries>,
    pub cutoff_ts: Option<i64>,
    pub signal_base_minutes: i64,
    pub show_signals: bool,
    pub show_misses: bool,
}

/// Everything the scene builder needs for one pane.
#[derive(Debug)]
pub struct SceneRequest<'a> {
    pub pane: PaneSide,
    pub series: &'a TimeframeSeries,
    pub state: &'a ViewState,
    pub y_range: Option<PriceRange>,
    pub auto_y: bool,
    pub chart_width_px: Option<f64>,
    pub symbol: Option<&'a str>,
    pub axis_mode: AxisMode,
    pub hover_enabled: bool,
    pub session_days: u32,
    pub annotations: Option<AnnotationLayer<'a>>,
}

/// Built scene plus the state the caller folds back into the regime cache.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltScene {
    pub scene: Scene,
    /// Display times of the first and last visible bars.
    pub visible_time_range: Option<(String, String)>,
    pub used_y_range: Option<PriceRange>,
}

#[must_use]
pub fn scene_title(symbol: Option<&str>, timeframe: Timeframe) -> String {
    format!("{} · {timeframe} (NY)", symbol.unwrap_or("?"))
}

fn box_shape(projected: &ProjectedBox) -> ShapeTrace {
    let (x0, x1) = (projected.x0, projected.x1);
    let (lo, hi) = (projected.price_low, projected.price_high);
    let (color, name) = match projected.direction {
        Direction::Buy => (BUY_BOX_COLOR, "setup buy"),
        Direction::Sell => (SELL_BOX_COLOR, "setup sell"),
    };
    let dash = if projected.solid { LineDash::Solid } else { LineDash::Dot };
    ShapeTrace {
        group: TraceGroup::SetupBox,
        name: name.to_owned(),
        points: vec![(x0, hi), (x1, hi), (x1, lo), (x0, lo), (x0, hi)],
        fill: None,
        stroke: Some(Stroke::new(color, 1.0, dash)),
    }
}

fn trade_shapes(projected: &ProjectedTrade, out: &mut Vec<SceneTrace>) {
    for zone in &projected.zones {
        let (fill, name) = match zone.kind {
            ZoneKind::StopLoss => (STOP_ZONE_FILL, "stop zone"),
            ZoneKind::TakeProfit => (TARGET_ZONE_FILL, "target zone"),
            ZoneKind::Result { profit: true } => (TARGET_ZONE_FILL, "result zone"),
            ZoneKind::Result { profit: false } => (STOP_ZONE_FILL, "result zone"),
        };
        let (x0, x1) = (zone.x0, zone.x1);
        let (lo, hi) = (zone.price_low, zone.price_high);
        out.push(SceneTrace::Shape(ShapeTrace {
            group: TraceGroup::TradeZone,
            name: name.to_owned(),
            points: vec![(x0, lo), (x1, lo), (x1, hi), (x0, hi), (x0, lo)],
            fill: Some(fill),
            stroke: None,
        }));
    }
    if let Some((from, to)) = projected.connector {
        out.push(SceneTrace::Shape(ShapeTrace {
            group: TraceGroup::TradeConnector,
            name: "trade".to_owned(),
            points: vec![from, to],
            fill: None,
            stroke: Some(Stroke::new(CONNECTOR_COLOR, 1.0, LineDash::Dash)),
        }));
    }
}

/// Materializes the scene of one pane from its view state.
///
/// A state whose window is empty yields a "no data" scene and keeps the
/// requested vertical range untouched.
#[must_use]
pub fn build_scene(request: SceneRequest<'_>, tick_tuning: &TimeTickTuning) -> BuiltScene {
    let SceneRequest {
        pane,
        series,
        state,
        y_range,
        auto_y,
        chart_width_px,
        symbol,
        axis_mode,
        hover_enabled,
        session_days,
        annotations,
    } = request;
    let timeframe = series.timeframe();

    if state.is_empty() || series.is_empty() {
        return BuiltScene {
            scene: Scene::no_data(pane, Some(timeframe), format!("{timeframe} · no data")),
            visible_time_range: None,
            used_y_range: y_range,
        };
    }

    let window_bars = series.slice_for_range(state.window_start as f64, state.window_end as f64);
    let visible_bars = series.slice_for_range(state.visible_start_idx, state.visible_end_idx);

    let mut candles = CandleTrace {
        hover_enabled,
        ..CandleTrace::default()
    };
    for bar in window_bars {
        candles.x.push(bar.i);
        candles.open.push(bar.o);
        candles.high.push(bar.h);
        candles.low.push(bar.l);
        candles.close.push(bar.c);
        candles.hover.push(format_hover_time(bar.ts));
    }

    let used_y_range = match y_range {
        Some(range) if !auto_y => Some(range),
        _ => auto_range(series, state),
    };
    let visible_time_range = match (visible_bars.first(), visible_bars.last()) {
        (Some(first), Some(last)) => Some((first.t.clone(), last.t.clone())),
        _ => None,
    };

    let ticks = compute_time_ticks(series, state, chart_width_px, tick_tuning);
    let tick_marks = ticks
        .ticks
        .iter()
        .filter(|tick| !tick.label.is_empty())
        .map(|tick| tick.index)
        .collect();

    let mut traces = Vec::new();
    for band in build_session_bands(timeframe, pane, state, window_bars, session_days) {
        traces.push(SceneTrace::Shape(ShapeTrace {
            group: TraceGroup::Session,
            name: band.session.name().to_owned(),
            points: band.points,
            fill: Some(band.session.fill_color()),
            stroke: None,
        }));
    }

    if let Some(layer) = annotations {
        let ctx = ProjectionContext {
            pane,
            series,
            base: layer.base,
            window_start: state.window_start,
            window_end: state.window_end,
            cutoff_ts: layer.cutoff_ts,
            signal_base_minutes: layer.signal_base_minutes,
            show_signals: layer.show_signals,
            show_misses: layer.show_misses,
        };
        let boxes = project_setup_boxes(layer.boxes, &ctx);
        traces.extend(boxes.iter().map(|b| SceneTrace::Shape(box_shape(b))));
        for projected in project_trades(layer.trades, layer.boxes, &ctx) {
            trade_shapes(&projected, &mut traces);
        }
    }
    traces.push(SceneTrace::Candles(candles));

    trace!(
        pane = pane.as_str(),
        timeframe = %timeframe,
        traces = traces.len(),
        ticks = ticks.ticks.len(),
        "scene built"
    );

    let scene = Scene {
        pane,
        timeframe: Some(timeframe),
        traces,
        layout: SceneLayout {
            title: scene_title(symbol, timeframe),
            x_range: state.view_range(),
            y_range: used_y_range,
            ticks: ticks
                .ticks
                .iter()
                .map(|tick| TickLabel {
                    index: tick.index,
                    label: tick.label.clone(),
                    emphasized: tick.emphasized,
                })
                .collect(),
            hidden_ticks: ticks.hidden.clone(),
            tick_marks,
            price_axis_side: pane,
            margins: Margins::for_pane(pane),
            x_fixed: axis_mode == AxisMode::Y,
            y_fixed: axis_mode == AxisMode::X,
        },
        no_data: false,
    };

    BuiltScene {
        scene,
        visible_time_range,
        used_y_range,
    }
}
