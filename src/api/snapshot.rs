use tracing::trace;

use crate::core::{Bar, TimeframeSeries};

/// Higher-timeframe series truncated at a cursor time.
///
/// The last bar is rebuilt from base bars in `[open, cursor)` so it shows the
/// bar as it looked while still forming.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSeries {
    pub series: TimeframeSeries,
    /// Index of the (partial) last bar.
    pub bar_index: i64,
    pub cursor_ts: i64,
}

/// Builds the snapshot of `htf` as of `cursor_ts` using `base` for the partial bar.
///
/// Returns `None` when either series is empty or no higher-timeframe bar opens
/// at or before the cursor. When no base bar falls inside the forming bar, the
/// truncated series keeps the original OHLC of its last bar.
#[must_use]
pub fn build_snapshot_series(
    htf: &TimeframeSeries,
    base: &TimeframeSeries,
    cursor_ts: i64,
) -> Option<SnapshotSeries> {
    if htf.is_empty() || base.is_empty() {
        return None;
    }
    let pos = htf.find_pos_le(cursor_ts)?;
    let open_bar = htf.bar_at_pos(pos)?;

    let partial = match (base.find_pos_ge(open_bar.ts), base.find_pos_le(cursor_ts - 1)) {
        (Some(start), Some(end)) if end >= start => aggregate(open_bar, &base.bars()[start..=end]),
        _ => None,
    };
    trace!(
        timeframe = %htf.timeframe(),
        cursor_ts,
        open_ts = open_bar.ts,
        aggregated = partial.is_some(),
        "snapshot series built"
    );

    let series = htf.truncated(pos, partial);
    let bar_index = series.last()?.i;
    Some(SnapshotSeries {
        series,
        bar_index,
        cursor_ts,
    })
}

fn aggregate(open_bar: &Bar, finer: &[Bar]) -> Option<Bar> {
    let (first, last) = (finer.first()?, finer.last()?);
    let (low, high) = finer
        .iter()
        .fold((first.l, first.h), |(lo, hi), bar| (lo.min(bar.l), hi.max(bar.h)));
    Some(Bar {
        o: first.o,
        h: high,
        l: low,
        c: last.c,
        ..open_bar.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Timeframe;

    const H1: i64 = 3_600_000;

    fn hourly() -> TimeframeSeries {
        let bars = (0..3)
            .map(|i| Bar::at(i, i * H1, 10.0, 20.0, 5.0, 15.0).expect("bar"))
            .collect();
        TimeframeSeries::new(Timeframe::H1, bars).expect("series")
    }

    fn minutes(count: i64) -> TimeframeSeries {
        let bars = (0..count)
            .map(|i| {
                let px = 100.0 + i as f64;
                Bar::at(i, i * 60_000, px, px + 2.0, px - 1.0, px + 1.0).expect("bar")
            })
            .collect();
        TimeframeSeries::new(Timeframe::M1, bars).expect("series")
    }

    #[test]
    fn partial_bar_aggregates_base_bars_before_cursor() {
        let snap = build_snapshot_series(&hourly(), &minutes(180), H1 + 10 * 60_000)
            .expect("snapshot");
        assert_eq!(snap.bar_index, 1);
        assert_eq!(snap.series.len(), 2);
        let last = snap.series.last().expect("last bar");
        assert_eq!(last.o, 160.0);
        assert_eq!(last.c, 170.0);
        assert_eq!(last.h, 171.0);
        assert_eq!(last.l, 159.0);
    }

    #[test]
    fn falls_back_to_original_bar_without_base_coverage() {
        let snap = build_snapshot_series(&hourly(), &minutes(30), 2 * H1 + 60_000)
            .expect("snapshot");
        assert_eq!(snap.bar_index, 2);
        assert_eq!(snap.series.last().expect("last").c, 15.0);
    }

    #[test]
    fn cursor_before_first_bar_yields_none() {
        assert!(build_snapshot_series(&hourly(), &minutes(30), -1).is_none());
    }
}
