use proptest::prelude::*;
use replay_chart::api::{TimeTickTuning, compute_time_ticks};
use replay_chart::core::{Bar, Timeframe, TimeframeSeries, WindowTuning, compute_right_anchored};

const START_TS: i64 = 1_704_186_000_000;

fn series(timeframe: Timeframe, count: i64) -> TimeframeSeries {
    let step = timeframe.duration_ms();
    let bars = (0..count)
        .map(|i| Bar::at(i, START_TS + i * step, 1.0, 2.0, 0.5, 1.5).expect("valid bar"))
        .collect();
    TimeframeSeries::new(timeframe, bars).expect("valid series")
}

fn timeframe_strategy() -> impl Strategy<Value = Timeframe> {
    prop_oneof![
        Just(Timeframe::M1),
        Just(Timeframe::M5),
        Just(Timeframe::M15),
        Just(Timeframe::H1),
        Just(Timeframe::H4),
        Just(Timeframe::D1),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ticks_are_monotonic_and_inside_window(
        timeframe in timeframe_strategy(),
        count in 2i64..1_500,
        bars in 2.0f64..600.0,
        anchor_ratio in 0.0f64..1.0,
        width in 120.0f64..2_400.0
    ) {
        let s = series(timeframe, count);
        let anchor = (anchor_ratio * (count - 1) as f64).round();
        let state = compute_right_anchored(&s, bars, Some(anchor), WindowTuning::default());
        let ticks = compute_time_ticks(&s, &state, Some(width), &TimeTickTuning::default());

        let values = ticks.tick_values();
        prop_assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
        for value in &values {
            prop_assert!(*value >= state.window_start);
            prop_assert!(*value <= state.window_end);
        }
        for hidden in &ticks.hidden {
            prop_assert!(values.contains(hidden));
        }
        prop_assert!(ticks.max_ticks >= 2);
    }

    #[test]
    fn labelled_ticks_fit_width_budget_without_month_anchors(
        timeframe in timeframe_strategy(),
        count in 2i64..1_500,
        bars in 2.0f64..600.0,
        width in 120.0f64..2_400.0
    ) {
        let s = series(timeframe, count);
        let state = compute_right_anchored(&s, bars, Some((count - 1) as f64), WindowTuning::default());
        let ticks = compute_time_ticks(&s, &state, Some(width), &TimeTickTuning::default());

        let Some(granularity) = ticks.granularity.filter(|g| !g.injects_month_anchors()) else {
            return Ok(());
        };
        let labelled = ticks.labels().iter().filter(|label| !label.is_empty()).count();
        prop_assert!(
            labelled <= ticks.max_ticks,
            "{labelled} labels over budget {} at {granularity:?}",
            ticks.max_ticks
        );
    }
}
