use approx::assert_abs_diff_eq;
use replay_chart::core::{
    Bar, CorrectionDirection, Timeframe, TimeframeSeries, WindowTuning, auto_range,
    compute_right_anchored, vertical_correction,
};

const START_TS: i64 = 1_704_186_000_000;

fn flat_series(count: i64, low: f64, high: f64) -> TimeframeSeries {
    let bars = (0..count)
        .map(|i| {
            let mid = 0.5 * (low + high);
            Bar::at(i, START_TS + i * 300_000, mid, high, low, mid).expect("valid bar")
        })
        .collect();
    TimeframeSeries::new(Timeframe::M5, bars).expect("valid series")
}

#[test]
fn candles_above_view_pull_range_up_with_padding() {
    let series = flat_series(50, 111.0, 115.0);
    let correction =
        vertical_correction(&series, 10.0, 40.0, (100.0, 110.0), 0.10).expect("correction");

    assert_eq!(correction.direction, CorrectionDirection::Up);
    assert_abs_diff_eq!(correction.range.0, 102.0, epsilon = 1e-9);
    assert_abs_diff_eq!(correction.range.1, 112.0, epsilon = 1e-9);
}

#[test]
fn candles_below_view_pull_range_down_with_padding() {
    let series = flat_series(50, 90.0, 95.0);
    let correction =
        vertical_correction(&series, 0.0, 49.0, (100.0, 110.0), 0.10).expect("correction");

    assert_eq!(correction.direction, CorrectionDirection::Down);
    assert_abs_diff_eq!(correction.range.0, 94.0, epsilon = 1e-9);
    assert_abs_diff_eq!(correction.range.1, 104.0, epsilon = 1e-9);
}

#[test]
fn intersecting_candles_leave_range_alone() {
    let series = flat_series(50, 105.0, 120.0);
    assert!(vertical_correction(&series, 0.0, 49.0, (100.0, 110.0), 0.10).is_none());
}

#[test]
fn degenerate_inputs_yield_no_correction() {
    let series = flat_series(20, 111.0, 115.0);
    assert!(vertical_correction(&series, 0.0, 19.0, (110.0, 100.0), 0.10).is_none());
    assert!(vertical_correction(&series, 0.0, 19.0, (f64::NAN, 110.0), 0.10).is_none());
    assert!(vertical_correction(&series, f64::NAN, 19.0, (100.0, 110.0), 0.10).is_none());

    let empty = TimeframeSeries::empty(Timeframe::M5);
    assert!(vertical_correction(&empty, 0.0, 19.0, (100.0, 110.0), 0.10).is_none());
}

#[test]
fn auto_range_covers_visible_bars_only() {
    let bars = (0..100)
        .map(|i| {
            let px = 100.0 + i as f64;
            Bar::at(i, START_TS + i * 60_000, px, px + 1.0, px - 1.0, px).expect("valid bar")
        })
        .collect();
    let series = TimeframeSeries::new(Timeframe::M1, bars).expect("valid series");
    let state = compute_right_anchored(&series, 10.0, None, WindowTuning::default());

    let (low, high) = auto_range(&series, &state).expect("range");
    assert_abs_diff_eq!(low, 189.0, epsilon = 1e-9);
    assert_abs_diff_eq!(high, 200.0, epsilon = 1e-9);
}
