use serde::{Deserialize, Serialize};

use crate::core::primitives::MS_PER_MINUTE;
use crate::core::{CANDLE_HALF_WIDTH, PaneSide, TimeframeSeries, price_extent};
use crate::extensions::{Direction, SetupBox, Trade, find_box_for_trade};

/// Inputs shared by box and trade projection for one pane render.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub pane: PaneSide,
    /// Series being drawn (possibly a snapshot series on the left pane).
    pub series: &'a TimeframeSeries,
    /// Fine series used to size boxes in price.
    pub base: Option<&'a TimeframeSeries>,
    pub window_start: i64,
    pub window_end: i64,
    /// Left-pane cutoff: annotations closing after this time are hidden.
    pub cutoff_ts: Option<i64>,
    pub signal_base_minutes: i64,
    pub show_signals: bool,
    pub show_misses: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedBox {
    pub setup_index: usize,
    pub direction: Direction,
    pub x0: f64,
    pub x1: f64,
    pub price_low: f64,
    pub price_high: f64,
    /// Solid outline for the active snapshot box on the left pane, dotted otherwise.
    pub solid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    StopLoss,
    TakeProfit,
    Result { profit: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedZone {
    pub kind: ZoneKind,
    pub x0: f64,
    pub x1: f64,
    pub price_low: f64,
    pub price_high: f64,
}

impl ProjectedZone {
    fn between(kind: ZoneKind, x0: f64, x1: f64, a: f64, b: f64) -> Self {
        Self {
            kind,
            x0,
            x1,
            price_low: a.min(b),
            price_high: a.max(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedTrade {
    pub trade_pos: usize,
    pub missed: bool,
    pub zones: Vec<ProjectedZone>,
    /// Dashed entry-to-exit segment of a filled trade.
    pub connector: Option<((f64, f64), (f64, f64))>,
}

/// Logical close time of a box and the latest bar time that still belongs to it.
fn box_close(b: &SetupBox, signal_base_minutes: i64) -> (i64, i64) {
    match b.signal_ts {
        Some(signal_ts) => {
            let close = signal_ts + signal_base_minutes * MS_PER_MINUTE;
            (close, close - 1)
        }
        None => {
            let close = b.top_ts.max(b.bottom_ts);
            (close, close)
        }
    }
}

/// Index span of bars between `start_ts` and `end_ts` (at-or-before lookups).
fn index_span(series: &TimeframeSeries, start_ts: i64, end_ts: i64) -> Option<(i64, i64)> {
    if series.is_empty() {
        return None;
    }
    let mut pos_l = series.find_pos_le(start_ts).unwrap_or(0);
    let mut pos_r = series.find_pos_le(end_ts).unwrap_or(series.len() - 1);
    if pos_r < pos_l {
        std::mem::swap(&mut pos_l, &mut pos_r);
    }
    let left = series.bar_at_pos(pos_l)?.i;
    let right = series.bar_at_pos(pos_r)?.i;
    Some((left.min(right), left.max(right)))
}

/// Price extent of the base-series bars inside the box's time span.
fn base_price_bounds(base: &TimeframeSeries, start_ts: i64, search_right: i64) -> Option<(f64, f64)> {
    let (left, right) = index_span(base, start_ts, search_right)?;
    price_extent(base.slice_for_range(left as f64, right as f64))
}

/// Projects setup boxes into index/price rectangles clipped to the window.
///
/// Missing price bounds are resolved from `base` (else the drawn series) and
/// cached on the box.
pub fn project_setup_boxes(boxes: &mut [SetupBox], ctx: &ProjectionContext<'_>) -> Vec<ProjectedBox> {
    let mut out = Vec::new();
    if !ctx.show_signals || ctx.series.is_empty() {
        return out;
    }
    for b in boxes.iter_mut() {
        let start_ts = b.top_ts.min(b.bottom_ts);
        let (close_ts, search_right) = box_close(b, ctx.signal_base_minutes);
        if ctx.pane == PaneSide::Left && ctx.cutoff_ts.is_some_and(|cutoff| close_ts > cutoff) {
            continue;
        }

        let Some((idx_l, idx_r)) = index_span(ctx.series, start_ts, search_right) else {
            continue;
        };
        let left = idx_l.max(ctx.window_start);
        let right = idx_r.min(ctx.window_end);
        if right < ctx.window_start || left > ctx.window_end || right < left {
            continue;
        }

        if b.price_bounds.is_none() {
            b.price_bounds = ctx
                .base
                .filter(|base| !base.is_empty())
                .and_then(|base| base_price_bounds(base, start_ts, search_right))
                .or_else(|| price_extent(ctx.series.slice_for_range(left as f64, right as f64)));
        }
        let Some((low, high)) = b.price_bounds else {
            continue;
        };

        out.push(ProjectedBox {
            setup_index: b.setup_index,
            direction: b.direction,
            x0: left as f64 - CANDLE_HALF_WIDTH,
            x1: right as f64 + CANDLE_HALF_WIDTH,
            price_low: low,
            price_high: high,
            solid: ctx.pane == PaneSide::Left && b.is_snapshot_active,
        });
    }
    out
}

fn pos_ge_or_le(series: &TimeframeSeries, ts: i64) -> Option<usize> {
    series.find_pos_ge(ts).or_else(|| series.find_pos_le(ts))
}

fn project_filled(trade_pos: usize, trade: &Trade, ctx: &ProjectionContext<'_>) -> Option<ProjectedTrade> {
    let series = ctx.series;
    let pos_entry = pos_ge_or_le(series, trade.entry_ts?)?;
    let pos_exit = pos_ge_or_le(series, trade.exit_ts?)?;
    let entry_bar = series.bar_at_pos(pos_entry)?;
    let exit_bar = series.bar_at_pos(pos_exit)?;
    let (idx_entry, idx_exit) = (entry_bar.i, exit_bar.i);
    if idx_entry.max(idx_exit) < ctx.window_start || idx_entry.min(idx_exit) > ctx.window_end {
        return None;
    }

    let entry = trade.entry_price.filter(|p| p.is_finite()).unwrap_or(entry_bar.c);
    let exit = trade.exit_price.filter(|p| p.is_finite()).unwrap_or(exit_bar.c);

    let (x0, x1, line_start, line_end) = if idx_entry == idx_exit {
        let center = idx_entry as f64;
        (
            center - CANDLE_HALF_WIDTH,
            center + CANDLE_HALF_WIDTH,
            center - CANDLE_HALF_WIDTH,
            center + CANDLE_HALF_WIDTH,
        )
    } else {
        (
            idx_entry.min(idx_exit) as f64,
            idx_entry.max(idx_exit) as f64,
            idx_entry as f64,
            idx_exit as f64,
        )
    };

    let mut zones = Vec::with_capacity(3);
    if let Some(sl) = trade.sl_price.filter(|p| p.is_finite()) {
        zones.push(ProjectedZone::between(ZoneKind::StopLoss, x0, x1, entry, sl));
    }
    if let Some(tp) = trade.tp_price.filter(|p| p.is_finite()) {
        zones.push(ProjectedZone::between(ZoneKind::TakeProfit, x0, x1, entry, tp));
    }
    if entry != exit {
        let profit = match trade.direction {
            Some(Direction::Buy) => exit > entry,
            _ => exit < entry,
        };
        zones.push(ProjectedZone::between(ZoneKind::Result { profit }, x0, x1, entry, exit));
    }

    Some(ProjectedTrade {
        trade_pos,
        missed: false,
        zones,
        connector: Some(((line_start, entry), (line_end, exit))),
    })
}

fn project_missed(
    trade_pos: usize,
    trade: &Trade,
    boxes: &[SetupBox],
    ctx: &ProjectionContext<'_>,
) -> Option<ProjectedTrade> {
    let series = ctx.series;
    let entry = trade.entry_price.filter(|p| p.is_finite())?;
    let signal_ts = find_box_for_trade(boxes, trade)?.signal_ts?;
    let signal_idx = series.bar_at_pos(pos_ge_or_le(series, signal_ts)?)?.i;

    let mut start = signal_idx + 1;
    let mut end = trade
        .expiration_ts
        .and_then(|exp| series.find_pos_ge(exp))
        .and_then(|first_after| series.bar_at_pos(first_after.saturating_sub(1)))
        .map_or(ctx.window_end, |bar| bar.i);
    if end < start {
        std::mem::swap(&mut start, &mut end);
    }

    let left = start.max(ctx.window_start);
    let right = end.min(ctx.window_end);
    if right < ctx.window_start || left > ctx.window_end || right < left {
        return None;
    }
    let (x0, x1) = if left == right {
        (left as f64 - CANDLE_HALF_WIDTH, right as f64 + CANDLE_HALF_WIDTH)
    } else {
        (left as f64, right as f64)
    };

    let mut zones = Vec::with_capacity(2);
    if let Some(sl) = trade.sl_price.filter(|p| p.is_finite()) {
        zones.push(ProjectedZone::between(ZoneKind::StopLoss, x0, x1, entry, sl));
    }
    if let Some(tp) = trade.tp_price.filter(|p| p.is_finite()) {
        zones.push(ProjectedZone::between(ZoneKind::TakeProfit, x0, x1, entry, tp));
    }
    Some(ProjectedTrade {
        trade_pos,
        missed: true,
        zones,
        connector: None,
    })
}

/// Projects trades into zone rectangles and entry/exit connectors.
///
/// Missed trades start one bar after their setup's signal bar and end at the
/// bar before expiration (or the window end).
#[must_use]
pub fn project_trades(trades: &[Trade], boxes: &[SetupBox], ctx: &ProjectionContext<'_>) -> Vec<ProjectedTrade> {
    if ctx.series.is_empty() {
        return Vec::new();
    }
    trades
        .iter()
        .enumerate()
        .filter(|(_, trade)| {
            ctx.pane != PaneSide::Left
                || !matches!((ctx.cutoff_ts, trade.reference_ts()), (Some(cutoff), Some(ts)) if ts > cutoff)
        })
        .filter(|(_, trade)| ctx.show_misses || !trade.is_missed())
        .filter_map(|(trade_pos, trade)| {
            let filled = trade.filled && trade.entry_ts.is_some() && trade.exit_ts.is_some();
            if filled {
                project_filled(trade_pos, trade, ctx)
            } else if trade.is_missed() {
                project_missed(trade_pos, trade, boxes, ctx)
            } else {
                None
            }
        })
        .collect()
}

/// Center of the part of a box's index span that lies inside `visible`.
///
/// Used to pick the setup nearest the middle of the view.
#[must_use]
pub fn box_visible_center(
    b: &SetupBox,
    series: &TimeframeSeries,
    visible: (f64, f64),
    signal_base_minutes: i64,
) -> Option<f64> {
    let start_ts = b.top_ts.min(b.bottom_ts);
    let mut end_ts = b.top_ts.max(b.bottom_ts);
    if signal_base_minutes > 1 {
        end_ts += (signal_base_minutes - 1) * MS_PER_MINUTE;
    }
    let (idx_l, idx_r) = index_span(series, start_ts, end_ts)?;
    let left = (idx_l as f64).max(visible.0);
    let right = (idx_r as f64).min(visible.1);
    (right >= left).then_some(0.5 * (left + right))
}
