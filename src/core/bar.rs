use serde::{Deserialize, Serialize};

use crate::core::primitives::{format_display_time, parse_display_time};
use crate::error::{ViewerError, ViewerResult};

/// One OHLC bar addressed by its integer index within a timeframe series.
///
/// `t` is the UTC-marked display timestamp, `ts` the derived epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub i: i64,
    pub t: String,
    pub ts: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
}

impl Bar {
    /// Builds a bar from its display timestamp.
    pub fn new(i: i64, t: impl Into<String>, o: f64, h: f64, l: f64, c: f64) -> ViewerResult<Self> {
        let t = t.into();
        let ts = parse_display_time(&t)
            .ok_or_else(|| ViewerError::InvalidData(format!("bar {i} has unparseable time `{t}`")))?;
        let bar = Self { i, t, ts, o, h, l, c };
        bar.validate()?;
        Ok(bar)
    }

    /// Builds a bar from epoch milliseconds.
    pub fn at(i: i64, ts: i64, o: f64, h: f64, l: f64, c: f64) -> ViewerResult<Self> {
        let bar = Self {
            i,
            t: format_display_time(ts),
            ts,
            o,
            h,
            l,
            c,
        };
        bar.validate()?;
        Ok(bar)
    }

    pub fn validate(&self) -> ViewerResult<()> {
        if !self.o.is_finite() || !self.h.is_finite() || !self.l.is_finite() || !self.c.is_finite()
        {
            return Err(ViewerError::InvalidData(format!(
                "bar {} has non-finite OHLC values",
                self.i
            )));
        }
        if self.h < self.l {
            return Err(ViewerError::InvalidData(format!(
                "bar {} has high below low",
                self.i
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn mid(&self) -> f64 {
        0.5 * (self.h + self.l)
    }
}

/// High/low envelope of `bars`, `None` when empty.
#[must_use]
pub fn price_extent(bars: &[Bar]) -> Option<(f64, f64)> {
    let mut iter = bars.iter();
    let first = iter.next()?;
    let (low, high) = iter.fold((first.l, first.h), |(low, high), bar| {
        (low.min(bar.l), high.max(bar.h))
    });
    (low.is_finite() && high.is_finite()).then_some((low, high))
}
