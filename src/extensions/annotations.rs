use std::cmp::Ordering;
use std::str::FromStr;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::PriceRange;
use crate::core::primitives::datetime_from_ms;
use crate::error::ViewerError;

const NBSP: char = '\u{00A0}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl FromStr for Direction {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Self::Buy),
            "sell" | "short" => Ok(Self::Sell),
            other => Err(ViewerError::InvalidData(format!("unknown direction `{other}`"))),
        }
    }
}

/// Signal rectangle spanning `top_ts..bottom_ts` in time and the price extent
/// of the bars inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupBox {
    pub direction: Direction,
    pub top_ts: i64,
    pub bottom_ts: i64,
    pub signal_ts: Option<i64>,
    pub date_ny: String,
    pub setup_index: usize,
    #[serde(default)]
    pub signal_tf: Option<String>,
    /// Price extent resolved on first projection and reused afterwards.
    #[serde(default)]
    pub price_bounds: Option<PriceRange>,
    #[serde(default)]
    pub is_snapshot_active: bool,
}

impl SetupBox {
    #[must_use]
    pub fn new(direction: Direction, top_ts: i64, bottom_ts: i64, setup_index: usize) -> Self {
        Self {
            direction,
            top_ts,
            bottom_ts,
            signal_ts: Some(bottom_ts),
            date_ny: String::new(),
            setup_index,
            signal_tf: None,
            price_bounds: None,
            is_snapshot_active: false,
        }
    }

    #[must_use]
    pub fn with_date_ny(mut self, date_ny: impl Into<String>) -> Self {
        self.date_ny = date_ny.into();
        self
    }

    #[must_use]
    pub fn with_price_bounds(mut self, low: f64, high: f64) -> Self {
        self.price_bounds = Some((low.min(high), low.max(high)));
        self
    }
}

/// Backtest trade, either filled (entry and exit known) or missed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trade {
    pub direction: Option<Direction>,
    pub filled: bool,
    pub entry_ts: Option<i64>,
    pub exit_ts: Option<i64>,
    pub expiration_ts: Option<i64>,
    pub entry_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub tp_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub result_r: Option<f64>,
    pub setup_index: Option<usize>,
    pub date_ny: String,
    pub symbol: String,
    pub scenario_id: String,
    pub exit_mode: String,
    pub miss_reason: String,
}

impl Trade {
    /// Time the trade is ordered and filtered by: entry, else expiration.
    #[must_use]
    pub fn reference_ts(&self) -> Option<i64> {
        self.entry_ts.or(self.expiration_ts)
    }

    #[must_use]
    pub fn is_missed(&self) -> bool {
        !self.filled
    }
}

/// Box of `trade`: same setup index first, else first box with the same
/// trading date and direction.
#[must_use]
pub fn find_box_for_trade<'a>(boxes: &'a [SetupBox], trade: &Trade) -> Option<&'a SetupBox> {
    find_box_pos_for_trade(boxes, trade).and_then(|pos| boxes.get(pos))
}

fn find_box_pos_for_trade(boxes: &[SetupBox], trade: &Trade) -> Option<usize> {
    if let Some(pos) = trade
        .setup_index
        .and_then(|index| boxes.iter().position(|b| b.setup_index == index))
    {
        return Some(pos);
    }
    if trade.date_ny.is_empty() {
        return None;
    }
    boxes
        .iter()
        .position(|b| b.date_ny == trade.date_ny && Some(b.direction) == trade.direction)
}

/// Navigable entry pairing a trade with its signal box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub id: usize,
    pub direction: Direction,
    pub signal_ts: i64,
    pub date_ny: String,
    pub achieved_r: f64,
    pub is_missed: bool,
    pub is_breakeven: bool,
    /// Position of the box in the annotation set.
    pub box_pos: usize,
    /// Position of the trade in the annotation set.
    pub trade_pos: usize,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupSortMode {
    #[default]
    TimeAsc,
    TimeDesc,
    DirLongShort,
    DirShortLong,
    RDesc,
    RAsc,
}

fn format_setup_label(
    direction: Direction,
    signal_ts: Option<i64>,
    date_ny: &str,
    achieved_r: f64,
    is_missed: bool,
) -> String {
    let dir_col = match direction {
        Direction::Buy => format!("BUY{NBSP}"),
        Direction::Sell => "SELL".to_owned(),
    };

    let date_part = signal_ts
        .and_then(datetime_from_ms)
        .map(|dt| dt.format("%d.%m.%y %H:%M").to_string())
        .or_else(|| {
            let parts: Vec<&str> = date_ny.split('-').collect();
            match parts.as_slice() {
                [y, m, d] => {
                    let skip = y.chars().count().saturating_sub(2);
                    let yy: String = y.chars().skip(skip).collect();
                    Some(format!("{d}.{m}.{yy} 00:00"))
                }
                _ => None,
            }
        })
        .unwrap_or_else(|| "??.??.?? ??:??".to_owned());

    let r_text = if is_missed {
        format!("{NBSP}{NBSP}miss")
    } else {
        let r = if achieved_r.is_finite() { achieved_r } else { 0.0 };
        let sign = if r >= 0.0 { "+" } else { "" };
        format!("{sign}{r:.2}R")
    };
    let pad = 6usize.saturating_sub(r_text.chars().count());
    let r_col: String = std::iter::repeat_n(NBSP, pad).chain(r_text.chars()).collect();

    let gap3: String = std::iter::repeat_n(NBSP, 3).collect();
    let gap4: String = std::iter::repeat_n(NBSP, 4).collect();
    format!("{dir_col}{gap3}{date_part}{gap4}{r_col}")
}

/// Setup boxes, trades and the derived navigation list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    pub boxes: Vec<SetupBox>,
    pub trades: Vec<Trade>,
    setups: Vec<Setup>,
}

impl AnnotationSet {
    #[must_use]
    pub fn new(boxes: Vec<SetupBox>, trades: Vec<Trade>) -> Self {
        Self {
            boxes,
            trades,
            setups: Vec::new(),
        }
    }

    #[must_use]
    pub fn setups(&self) -> &[Setup] {
        &self.setups
    }

    #[must_use]
    pub fn setup(&self, id: usize) -> Option<&Setup> {
        self.setups.iter().find(|setup| setup.id == id)
    }

    #[must_use]
    pub fn setup_box(&self, setup: &Setup) -> Option<&SetupBox> {
        self.boxes.get(setup.box_pos)
    }

    #[must_use]
    pub fn setup_trade(&self, setup: &Setup) -> Option<&Trade> {
        self.trades.get(setup.trade_pos)
    }

    /// Rebuilds the setup list from trades and their boxes.
    ///
    /// Trades without a box (or whose box lacks a signal time) are skipped,
    /// as are missed trades when `show_misses` is off.
    pub fn rebuild_setups(&mut self, show_misses: bool) {
        self.setups.clear();
        if self.trades.is_empty() || self.boxes.is_empty() {
            return;
        }
        for (trade_pos, trade) in self.trades.iter().enumerate() {
            let Some(box_pos) = find_box_pos_for_trade(&self.boxes, trade) else {
                continue;
            };
            let found = &self.boxes[box_pos];
            let Some(signal_ts) = found.signal_ts else {
                continue;
            };
            let is_missed = trade.is_missed();
            if is_missed && !show_misses {
                continue;
            }
            let direction = trade.direction.unwrap_or(found.direction);
            let date_ny = if trade.date_ny.is_empty() {
                found.date_ny.clone()
            } else {
                trade.date_ny.clone()
            };
            let achieved_r = trade.result_r.filter(|r| r.is_finite()).unwrap_or(0.0);
            let label =
                format_setup_label(direction, Some(signal_ts), &date_ny, achieved_r, is_missed);
            self.setups.push(Setup {
                id: self.setups.len(),
                direction,
                signal_ts,
                date_ny,
                achieved_r,
                is_missed,
                is_breakeven: trade.filled && achieved_r.abs() < 1e-6,
                box_pos,
                trade_pos,
                label,
            });
        }
    }

    /// Setups in presentation order for `mode`.
    #[must_use]
    pub fn sorted_setups(&self, mode: SetupSortMode) -> Vec<&Setup> {
        let mut list: Vec<&Setup> = self.setups.iter().collect();
        list.sort_by(|a, b| compare_setups(a, b, mode));
        list
    }

    /// Clears the snapshot flag on every box and sets it on the box at `box_pos`.
    pub fn mark_snapshot_box(&mut self, box_pos: Option<usize>) {
        for (pos, b) in self.boxes.iter_mut().enumerate() {
            b.is_snapshot_active = Some(pos) == box_pos;
        }
    }
}

fn compare_setups(a: &Setup, b: &Setup, mode: SetupSortMode) -> Ordering {
    let time_asc = a.signal_ts.cmp(&b.signal_ts);
    let r = |s: &Setup| OrderedFloat(if s.achieved_r.is_finite() { s.achieved_r } else { 0.0 });
    match mode {
        SetupSortMode::TimeAsc => time_asc,
        SetupSortMode::TimeDesc => time_asc.reverse(),
        SetupSortMode::DirLongShort | SetupSortMode::DirShortLong => {
            let first = if mode == SetupSortMode::DirLongShort {
                Direction::Buy
            } else {
                Direction::Sell
            };
            match (a.direction == first, b.direction == first) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => time_asc.reverse(),
            }
        }
        SetupSortMode::RDesc | SetupSortMode::RAsc => a
            .is_missed
            .cmp(&b.is_missed)
            .then_with(|| {
                if mode == SetupSortMode::RDesc {
                    r(b).cmp(&r(a))
                } else {
                    r(a).cmp(&r(b))
                }
            })
            .then(time_asc),
    }
}
