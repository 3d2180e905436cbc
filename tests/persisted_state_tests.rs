use replay_chart::api::{
    PERSISTED_STATE_JSON_SCHEMA_V1, PaneBehavior, PersistedViewerState, STORAGE_KEY, ViewMode,
    ViewerConfig, ViewerSession,
};
use replay_chart::core::{
    Bar, BarStore, PaneSide, Timeframe, TimeframeSeries, WindowTuning, compute_right_anchored,
};
use replay_chart::extensions::SetupSortMode;
use replay_chart::interaction::AxisMode;
use replay_chart::render::NullRenderer;

const START_TS: i64 = 1_704_186_000_000;

fn series(timeframe: Timeframe, count: i64) -> TimeframeSeries {
    let step = timeframe.duration_ms();
    let bars = (0..count)
        .map(|i| {
            let c = 50.0 + i as f64;
            Bar::at(i, START_TS + i * step, c, c + 1.0, c - 1.0, c).expect("valid bar")
        })
        .collect();
    TimeframeSeries::new(timeframe, bars).expect("valid series")
}

fn store() -> BarStore {
    let mut store = BarStore::new(Some("XAUUSD".to_owned()));
    store.insert(series(Timeframe::M1, 600));
    store.insert(series(Timeframe::M5, 120));
    store.insert(series(Timeframe::H1, 10));
    store
}

#[test]
fn contract_round_trip_keeps_state() {
    let state = PersistedViewerState {
        current_tf: Some(Timeframe::M1),
        current_tf_left: Some(Timeframe::H1),
        session_days: 20,
        view_mode: ViewMode::Split,
        pane_behavior: PaneBehavior::FollowSnapshot,
        setup_sort_mode: SetupSortMode::RDesc,
        split_fraction: 0.25,
        ..PersistedViewerState::default()
    };

    let json = state.to_json_contract_v1_pretty().expect("serialize");
    assert!(json.contains("\"schema_version\": 1"));
    assert!(json.contains("\"htfBehavior\": \"follow_ltf_snapshots\""));

    let parsed = PersistedViewerState::from_json_compat_str(&json).expect("parse");
    assert_eq!(parsed, state);
}

#[test]
fn bare_legacy_payload_is_accepted() {
    let json = r#"{
        "currentTf": "M5",
        "currentTfLeft": "H1",
        "axisMode": "y",
        "candleHoverOn": true,
        "sessionDays": 15,
        "SHOW_MISSES": false,
        "VIEW_MODE": "split",
        "htfBehavior": "follow_ltf_strict",
        "splitterLeftFraction": 0.4,
        "someFutureKey": 1
    }"#;

    let parsed = PersistedViewerState::from_json_compat_str(json).expect("parse");

    assert_eq!(parsed.current_tf, Some(Timeframe::M5));
    assert_eq!(parsed.axis_mode, AxisMode::Y);
    assert!(parsed.candle_hover_on);
    assert_eq!(parsed.session_days, 15);
    assert!(!parsed.show_misses);
    assert!(parsed.show_signals);
    assert_eq!(parsed.view_mode, ViewMode::Split);
    assert_eq!(parsed.pane_behavior, PaneBehavior::FollowStrict);
    assert!(parsed.tf_state.is_empty());
}

#[test]
fn unknown_schema_version_is_rejected() {
    let json = r#"{ "schema_version": 7, "state": {} }"#;
    assert!(PersistedViewerState::from_json_compat_str(json).is_err());
    assert!(PersistedViewerState::from_json_compat_str("not json").is_err());
}

#[test]
fn defaults_match_fresh_viewer() {
    let state = PersistedViewerState::default();
    assert_eq!(state.session_days, 10);
    assert!(state.show_misses && state.show_signals);
    assert!((state.split_fraction - 0.5).abs() <= 1e-12);
    assert_eq!(PERSISTED_STATE_JSON_SCHEMA_V1, 1);
    assert_eq!(STORAGE_KEY, "m1_mx_dynamic_viewer_state_v1");
}

#[test]
fn restore_skips_unusable_timeframes_and_clamps_values() {
    let tuning = WindowTuning::default();
    let mut saved = PersistedViewerState {
        current_tf: Some(Timeframe::M15),
        current_tf_left: Some(Timeframe::H1),
        axis_mode: AxisMode::X,
        session_days: 500,
        view_mode: ViewMode::Split,
        split_fraction: 1.5,
        ..PersistedViewerState::default()
    };
    let m5_view = compute_right_anchored(&series(Timeframe::M5, 120), 30.0, Some(80.0), tuning);
    saved.tf_state.insert(Timeframe::M5, m5_view.clone());
    saved.tf_state.insert(Timeframe::M15, m5_view.clone());
    saved.tf_state_left.insert(Timeframe::M5, m5_view.clone());

    let mut session =
        ViewerSession::new(NullRenderer::default(), store(), ViewerConfig::default()).expect("session");
    session.restore_persisted_state(saved);

    assert_eq!(session.timeframe(PaneSide::Right), Timeframe::M5);
    assert_eq!(session.timeframe(PaneSide::Left), Timeframe::H1);
    assert_eq!(session.axis_mode(), AxisMode::Both);
    assert_eq!(session.session_days(), 60);
    assert!((session.split_fraction() - 0.9).abs() <= 1e-12);
    assert_eq!(session.view_mode(), ViewMode::Split);
    assert!(session.pane(PaneSide::Right).view(Timeframe::M15).is_none());
    assert!(session.pane(PaneSide::Left).views().is_empty());
    assert_eq!(session.renderer().commit_count, 0);

    session.rerender_all().expect("render");
    let view = session.current_view(PaneSide::Right).expect("restored view");
    assert_eq!(view.visible_end_idx, 80.0);
    assert!(session.renderer().last_scene(PaneSide::Left).is_some());
}

#[test]
fn persisted_state_reflects_session() {
    let mut session =
        ViewerSession::new(NullRenderer::default(), store(), ViewerConfig::default()).expect("session");
    session.init_default_views().expect("init");
    session.set_session_days(2).expect("days");

    let state = session.persisted_state();
    assert_eq!(state.current_tf, Some(Timeframe::M5));
    assert_eq!(state.current_tf_left, Some(Timeframe::H1));
    assert_eq!(state.session_days, 3);
    assert!(state.tf_state.contains_key(&Timeframe::M5));
    assert!(state.regime_state.minute.initialized);
}
