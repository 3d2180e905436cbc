use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::core::bar::Bar;
use crate::core::primitives::{date_of, is_saturday};
use crate::core::timeframe::Timeframe;
use crate::error::{ViewerError, ViewerResult};

/// Ordered bars of one timeframe plus the derived calendar anchor tables.
///
/// Bars are sorted by index with contiguous indices, so the position of index
/// `i` is `i - min_idx`. Timestamps never decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeSeries {
    timeframe: Timeframe,
    bars: Vec<Bar>,
    min_idx: i64,
    max_idx: i64,
    year_first_trading: BTreeMap<i32, NaiveDate>,
    month_first_trading: BTreeMap<(i32, u32), NaiveDate>,
}

impl TimeframeSeries {
    pub fn new(timeframe: Timeframe, bars: Vec<Bar>) -> ViewerResult<Self> {
        for pair in bars.windows(2) {
            if pair[1].i != pair[0].i + 1 {
                return Err(ViewerError::InvalidData(format!(
                    "{timeframe} bar indices must be contiguous: {} follows {}",
                    pair[1].i, pair[0].i
                )));
            }
            if pair[1].ts < pair[0].ts {
                return Err(ViewerError::InvalidData(format!(
                    "{timeframe} bar {} is older than its predecessor",
                    pair[1].i
                )));
            }
        }
        for bar in &bars {
            bar.validate()?;
        }

        let mut year_first_trading = BTreeMap::new();
        let mut month_first_trading = BTreeMap::new();
        for date in bars.iter().filter_map(|bar| date_of(bar.ts)) {
            if is_saturday(date) {
                continue;
            }
            year_first_trading.entry(date.year()).or_insert(date);
            month_first_trading
                .entry((date.year(), date.month()))
                .or_insert(date);
        }

        let (min_idx, max_idx) = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (first.i, last.i),
            _ => (0, -1),
        };

        Ok(Self {
            timeframe,
            bars,
            min_idx,
            max_idx,
            year_first_trading,
            month_first_trading,
        })
    }

    #[must_use]
    pub fn empty(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            bars: Vec::new(),
            min_idx: 0,
            max_idx: -1,
            year_first_trading: BTreeMap::new(),
            month_first_trading: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    #[must_use]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[must_use]
    pub fn min_idx(&self) -> i64 {
        self.min_idx
    }

    #[must_use]
    pub fn max_idx(&self) -> i64 {
        self.max_idx
    }

    #[must_use]
    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    #[must_use]
    pub fn bar_at_pos(&self, pos: usize) -> Option<&Bar> {
        self.bars.get(pos)
    }

    #[must_use]
    pub fn pos_of_index(&self, idx: i64) -> Option<usize> {
        if self.is_empty() || idx < self.min_idx || idx > self.max_idx {
            return None;
        }
        usize::try_from(idx - self.min_idx).ok()
    }

    #[must_use]
    pub fn bar_at_index(&self, idx: i64) -> Option<&Bar> {
        self.pos_of_index(idx).and_then(|pos| self.bars.get(pos))
    }

    /// Position of the first bar with `ts >= target`.
    #[must_use]
    pub fn find_pos_ge(&self, target: i64) -> Option<usize> {
        let pos = self.bars.partition_point(|bar| bar.ts < target);
        (pos < self.bars.len()).then_some(pos)
    }

    /// Position of the last bar with `ts <= target`.
    #[must_use]
    pub fn find_pos_le(&self, target: i64) -> Option<usize> {
        self.bars
            .partition_point(|bar| bar.ts <= target)
            .checked_sub(1)
    }

    /// Bars whose index lies in `[start_idx, end_idx]`, fractional bounds truncated.
    #[must_use]
    pub fn slice_for_range(&self, start_idx: f64, end_idx: f64) -> &[Bar] {
        if self.is_empty() || !start_idx.is_finite() || !end_idx.is_finite() || end_idx < start_idx
        {
            return &[];
        }
        let min = self.min_idx as f64;
        let start_pos = (start_idx - min).max(0.0);
        let end_pos = (end_idx - min).min((self.bars.len() - 1) as f64);
        if end_pos < start_pos {
            return &[];
        }
        let start = start_pos.trunc() as usize;
        let end = ((end_pos + 1.0).trunc() as usize).min(self.bars.len());
        if end <= start {
            return &[];
        }
        &self.bars[start..end]
    }

    #[must_use]
    pub fn year_first_trading_date(&self, year: i32) -> Option<NaiveDate> {
        self.year_first_trading.get(&year).copied()
    }

    #[must_use]
    pub fn month_first_trading_date(&self, year: i32, month: u32) -> Option<NaiveDate> {
        self.month_first_trading.get(&(year, month)).copied()
    }

    pub fn month_first_trading_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.month_first_trading.values().copied()
    }

    /// Copy holding bars up to and including `pos`, optionally replacing the last one.
    ///
    /// Calendar anchor tables are inherited from the full series.
    #[must_use]
    pub fn truncated(&self, pos: usize, last: Option<Bar>) -> Self {
        let end = (pos + 1).min(self.bars.len());
        let mut bars = self.bars[..end].to_vec();
        if let (Some(replacement), Some(slot)) = (last, bars.last_mut()) {
            *slot = replacement;
        }
        let (min_idx, max_idx) = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (first.i, last.i),
            _ => (0, -1),
        };
        Self {
            timeframe: self.timeframe,
            bars,
            min_idx,
            max_idx,
            year_first_trading: self.year_first_trading.clone(),
            month_first_trading: self.month_first_trading.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> TimeframeSeries {
        let bars = (0..5)
            .map(|k| {
                Bar::at(10 + k, 1_700_000_000_000 + k * 60_000, 1.0, 2.0, 0.5, 1.5).expect("bar")
            })
            .collect();
        TimeframeSeries::new(Timeframe::M1, bars).expect("series")
    }

    #[test]
    fn rejects_gaps_in_indices() {
        let bars = vec![
            Bar::at(0, 0, 1.0, 1.0, 1.0, 1.0).expect("bar"),
            Bar::at(2, 60_000, 1.0, 1.0, 1.0, 1.0).expect("bar"),
        ];
        assert!(TimeframeSeries::new(Timeframe::M1, bars).is_err());
    }

    #[test]
    fn searches_by_timestamp() {
        let s = series();
        let base = 1_700_000_000_000;
        assert_eq!(s.find_pos_ge(base + 30_000), Some(1));
        assert_eq!(s.find_pos_le(base + 30_000), Some(0));
        assert_eq!(s.find_pos_le(base - 1), None);
        assert_eq!(s.find_pos_ge(base + 10 * 60_000), None);
    }

    #[test]
    fn slices_with_fractional_bounds() {
        let s = series();
        let slice = s.slice_for_range(10.5, 12.5);
        assert_eq!(slice.first().map(|b| b.i), Some(10));
        assert_eq!(slice.last().map(|b| b.i), Some(12));
        assert!(s.slice_for_range(20.0, 30.0).is_empty());
        assert!(s.slice_for_range(3.0, 1.0).is_empty());
    }

    #[test]
    fn truncation_keeps_anchor_tables() {
        let s = series();
        let cut = s.truncated(2, None);
        assert_eq!(cut.max_idx(), 12);
        assert_eq!(cut.len(), 3);
        assert_eq!(
            cut.month_first_trading_dates().count(),
            s.month_first_trading_dates().count()
        );
    }
}
