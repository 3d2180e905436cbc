use replay_chart::core::{
    Bar, Timeframe, TimeframeSeries, WindowTuning, compute_centered, compute_from_time_range,
    compute_right_anchored,
};

const START_TS: i64 = 1_704_186_000_000;

fn minute_series(count: i64) -> TimeframeSeries {
    let bars = (0..count)
        .map(|i| {
            Bar::at(i, START_TS + i * 60_000, 100.0, 101.0, 99.0, 100.5).expect("valid bar")
        })
        .collect();
    TimeframeSeries::new(Timeframe::M1, bars).expect("valid series")
}

#[test]
fn right_anchored_on_last_bar_clamps_buffer_to_data() {
    let series = minute_series(1_000);
    let state = compute_right_anchored(&series, 400.0, Some(999.0), WindowTuning::default());

    assert_eq!(state.visible_start_idx, 600.0);
    assert_eq!(state.visible_end_idx, 999.0);
    assert_eq!(state.visible_bars, 400.0);
    assert_eq!(state.window_start, 0);
    assert_eq!(state.window_end, 999);
    assert_eq!(state.view_range(), (599.5, 999.5));
}

#[test]
fn centered_window_keeps_visible_inside_buffer() {
    let series = minute_series(5_000);
    let state = compute_centered(&series, 200.0, Some(2_500.0), WindowTuning::default());

    assert_eq!(state.visible_bars, 200.0);
    assert!(state.window_start as f64 <= state.visible_start_idx);
    assert!(state.visible_end_idx <= state.window_end as f64);
    assert_eq!(state.window_end - state.window_start + 1, 600);
}

#[test]
fn non_positive_count_uses_default() {
    let series = minute_series(1_000);
    let tuning = WindowTuning::default();
    let state = compute_centered(&series, 0.0, None, tuning);

    assert_eq!(state.visible_bars, tuning.default_visible_bars as f64);
    assert_eq!(state.visible_end_idx, 999.0);
}

#[test]
fn empty_series_yields_degenerate_state() {
    let series = TimeframeSeries::empty(Timeframe::M5);
    let state = compute_right_anchored(&series, 400.0, Some(10.0), WindowTuning::default());

    assert!(state.is_empty());
    assert!(state.window_end < state.window_start);
}

#[test]
fn count_larger_than_series_shows_everything() {
    let series = minute_series(50);
    let state = compute_centered(&series, 400.0, Some(10.0), WindowTuning::default());

    assert_eq!(state.visible_start_idx, 0.0);
    assert_eq!(state.visible_end_idx, 49.0);
    assert_eq!(state.window_start, 0);
    assert_eq!(state.window_end, 49);
}

#[test]
fn exact_time_range_brackets_bars() {
    let series = minute_series(1_000);
    let first = series.bar_at_index(100).expect("bar").t.clone();
    let last = series.bar_at_index(199).expect("bar").t.clone();

    let state = compute_from_time_range(
        &series,
        Some((first.as_str(), last.as_str())),
        WindowTuning::default(),
    );

    assert_eq!(state.visible_start_idx, 100.0);
    assert_eq!(state.visible_end_idx, 199.0);
    assert_eq!(state.visible_bars, 100.0);
}

#[test]
fn unresolvable_time_range_falls_back_to_default() {
    let series = minute_series(1_000);
    let state = compute_from_time_range(
        &series,
        Some(("not a time", "also not")),
        WindowTuning::default(),
    );

    assert_eq!(state.visible_end_idx, 999.0);
    assert_eq!(state.visible_bars, 400.0);
}

#[test]
fn lookups_by_timestamp_bracket_gaps() {
    let series = minute_series(10);
    let between = START_TS + 3 * 60_000 + 30_000;

    assert_eq!(series.find_pos_le(between), Some(3));
    assert_eq!(series.find_pos_ge(between), Some(4));
    assert_eq!(series.find_pos_le(START_TS - 1), None);
    assert_eq!(series.find_pos_ge(START_TS + 10 * 60_000), None);
}

#[test]
fn extreme_counts_and_anchors_stay_within_series() {
    let series = minute_series(50);
    let tuning = WindowTuning {
        default_visible_bars: 400,
        buffer_factor: 1e12,
    };

    for (bars, anchor) in [
        (1e300, Some(10.0)),
        (9.3e18, Some(1e300)),
        (f64::MAX, Some(-1e300)),
        (25.0, Some(-1e300)),
        (25.0, Some(1e300)),
    ] {
        for state in [
            compute_right_anchored(&series, bars, anchor, tuning),
            compute_centered(&series, bars, anchor, tuning),
        ] {
            assert!(0.0 <= state.visible_start_idx);
            assert!(state.visible_start_idx <= state.visible_end_idx);
            assert!(state.visible_end_idx <= 49.0);
            assert_eq!((state.window_start, state.window_end), (0, 49));
        }
    }

    let state = compute_right_anchored(&series, 1e300, Some(49.0), tuning);
    assert_eq!(state.visible_bars, 50.0);
}
