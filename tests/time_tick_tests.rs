use replay_chart::api::{TimeTickTuning, compute_time_ticks, format_hover_time};
use replay_chart::core::{
    Bar, LabelUnit, TickGranularity, Timeframe, TimeframeSeries, ViewState, WindowTuning,
    compute_right_anchored,
};
use replay_chart::core::primitives::parse_display_time;

fn ts(text: &str) -> i64 {
    parse_display_time(text).expect("valid time")
}

fn regular_series(timeframe: Timeframe, start: &str, step_ms: i64, count: i64) -> TimeframeSeries {
    let start_ts = ts(start);
    let bars = (0..count)
        .map(|i| Bar::at(i, start_ts + i * step_ms, 1.0, 2.0, 0.5, 1.5).expect("valid bar"))
        .collect();
    TimeframeSeries::new(timeframe, bars).expect("valid series")
}

#[test]
fn one_day_of_five_minute_bars_uses_two_hour_grid() {
    let series = regular_series(Timeframe::M5, "2024-01-02T09:00", 300_000, 864);
    let state = compute_right_anchored(&series, 288.0, Some(863.0), WindowTuning::default());

    let ticks = compute_time_ticks(&series, &state, Some(1_000.0), &TimeTickTuning::default());

    assert_eq!(ticks.max_ticks, 13);
    assert_eq!(
        ticks.granularity,
        Some(TickGranularity::Intraday { step_minutes: 120 })
    );
    assert_eq!(ticks.ticks.len(), 12);
    assert_eq!(ticks.labels().first().copied(), Some("10:00"));

    let midnight = ticks
        .ticks
        .iter()
        .find(|tick| tick.ts == ts("2024-01-05T00:00"))
        .expect("midnight tick");
    assert_eq!(midnight.label, "5");
    assert_eq!(midnight.unit, LabelUnit::Day);
    assert!(midnight.emphasized);
}

#[test]
fn tick_values_are_strictly_increasing_inside_visible_range() {
    let series = regular_series(Timeframe::M1, "2024-03-04T09:30", 60_000, 2_000);
    let state = compute_right_anchored(&series, 400.0, Some(1_500.0), WindowTuning::default());

    let ticks = compute_time_ticks(&series, &state, Some(900.0), &TimeTickTuning::default());
    let values = ticks.tick_values();

    assert!(!values.is_empty());
    assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
    for value in values {
        let idx = value as f64;
        assert!(idx >= state.visible_start_idx - 1.0);
        assert!(idx <= state.visible_end_idx + 1.0);
    }
}

#[test]
fn daily_bars_over_four_months_label_months() {
    let series = regular_series(Timeframe::D1, "2024-01-01T00:00", 86_400_000, 120);
    let state = compute_right_anchored(&series, 120.0, Some(119.0), WindowTuning::default());

    let ticks = compute_time_ticks(&series, &state, Some(800.0), &TimeTickTuning::default());

    assert_eq!(ticks.granularity, Some(TickGranularity::Month));
    assert_eq!(ticks.labels(), vec!["Jan", "Feb", "Mar", "Apr"]);
    assert!(ticks.hidden.is_empty());
}

#[test]
fn missing_width_uses_default_budget() {
    let series = regular_series(Timeframe::M5, "2024-01-02T09:00", 300_000, 500);
    let state = compute_right_anchored(&series, 200.0, None, WindowTuning::default());

    let tuning = TimeTickTuning::default();
    let ticks = compute_time_ticks(&series, &state, None, &tuning);
    assert_eq!(ticks.max_ticks, tuning.default_max_ticks);
}

#[test]
fn empty_inputs_produce_no_ticks() {
    let empty = TimeframeSeries::empty(Timeframe::M5);
    let ticks = compute_time_ticks(&empty, &ViewState::empty(), Some(800.0), &TimeTickTuning::default());
    assert!(ticks.is_empty());
    assert!(ticks.granularity.is_none());
}

#[test]
fn hover_text_names_weekday_and_short_year() {
    assert_eq!(format_hover_time(ts("2024-03-04T09:30")), "Mon 04 Mar '24 09:30");
}
