use std::cell::RefCell;
use std::rc::Rc;

use replay_chart::api::{PaneBehavior, PersistedViewerState, ViewMode, ViewerConfig, ViewerObserver, ViewerSession};
use replay_chart::core::{Bar, BarStore, PaneSide, Timeframe, TimeframeSeries};
use replay_chart::extensions::{FeedKind, SetupSortMode};
use replay_chart::interaction::{AxisMode, CommandQueue, EventOrigin, SetupStep, ViewerCommand, ViewportChange};
use replay_chart::render::{NullRenderer, TraceGroup};
use replay_chart::ViewerError;

const START_TS: i64 = 1_704_186_000_000; // 2024-01-02 09:00 UTC
const MINUTE: i64 = 60_000;

fn minute_bars(count: i64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let c = 100.0 + i as f64 * 0.01;
            Bar::at(i, START_TS + i * MINUTE, c - 0.005, c + 0.02, c - 0.02, c).expect("valid bar")
        })
        .collect()
}

fn aggregate(minutes: &[Bar], per_bar: usize) -> Vec<Bar> {
    minutes
        .chunks(per_bar)
        .enumerate()
        .map(|(k, chunk)| {
            let high = chunk.iter().map(|b| b.h).fold(f64::MIN, f64::max);
            let low = chunk.iter().map(|b| b.l).fold(f64::MAX, f64::min);
            let (first, last) = (&chunk[0], &chunk[chunk.len() - 1]);
            Bar::at(k as i64, first.ts, first.o, high, low, last.c).expect("valid bar")
        })
        .collect()
}

fn store() -> BarStore {
    let m1 = minute_bars(600);
    let mut store = BarStore::new(Some("EURUSD".to_owned()));
    store.insert(TimeframeSeries::new(Timeframe::M5, aggregate(&m1, 5)).expect("m5"));
    store.insert(TimeframeSeries::new(Timeframe::H1, aggregate(&m1, 60)).expect("h1"));
    store.insert(TimeframeSeries::new(Timeframe::M1, m1).expect("m1"));
    store
}

fn session() -> ViewerSession<NullRenderer> {
    let mut session =
        ViewerSession::new(NullRenderer::default(), store(), ViewerConfig::default()).expect("session");
    session.init_default_views().expect("init");
    session
}

const TWO_SETUPS: &str = "\
direction,date_ny,signal_tf,signal_start_time,signal_end_time
buy,2024-01-02,M5,2024-01-02 09:30:00,2024-01-02 09:40:00
sell,2024-01-02,M5,2024-01-02 11:00:00,2024-01-02 11:10:00
";

const TWO_TRADES: &str = "\
direction,filled,entry_time,exit_time,expiration_time,entry_price,exit_price,result_R,setup_index,date_ny,miss_reason
buy,true,2024-01-02 09:45:00,2024-01-02 10:00:00,,100.5,100.8,1.0,0,2024-01-02,
sell,false,,,2024-01-02 11:45:00,101.2,,,1,2024-01-02,no_fill
";

fn load_annotations(session: &mut ViewerSession<NullRenderer>) {
    session.update_file_listing(&["demo_setups.csv", "demo_trades_v1.csv", "notes.txt"]);
    session
        .apply_feed_content(FeedKind::Setups, "demo_setups.csv", TWO_SETUPS)
        .expect("setups applied");
    session
        .apply_feed_content(FeedKind::Trades, "demo_trades_v1.csv", TWO_TRADES)
        .expect("trades applied");
}

#[derive(Debug, Default)]
struct Recorded {
    selections: Vec<Option<usize>>,
    persisted: usize,
    file_lists: Vec<(FeedKind, Vec<String>, Option<String>)>,
}

struct RecordingObserver(Rc<RefCell<Recorded>>);

impl ViewerObserver for RecordingObserver {
    fn setup_selection_changed(&mut self, setup_id: Option<usize>) {
        self.0.borrow_mut().selections.push(setup_id);
    }

    fn state_persisted(&mut self, _state: &PersistedViewerState) {
        self.0.borrow_mut().persisted += 1;
    }

    fn annotation_files_changed(&mut self, kind: FeedKind, files: &[String], selected: Option<&str>) {
        self.0
            .borrow_mut()
            .file_lists
            .push((kind, files.to_vec(), selected.map(str::to_owned)));
    }
}

#[test]
fn default_views_render_right_pane_only_in_single_mode() {
    let session = session();

    assert_eq!(session.renderer().commit_count, 1);
    let scene = session.renderer().last_scene(PaneSide::Right).expect("right scene");
    assert_eq!(scene.timeframe, Some(Timeframe::M5));
    assert!(session.renderer().last_scene(PaneSide::Left).is_none());

    let view = session.current_view(PaneSide::Right).expect("right view");
    assert_eq!((view.visible_start_idx, view.visible_end_idx), (0.0, 119.0));
    assert!(session.current_regime(PaneSide::Right).initialized);
}

#[test]
fn disallowed_timeframe_is_rejected() {
    let mut session = session();

    let err = session
        .set_timeframe(PaneSide::Left, Timeframe::M5)
        .expect_err("M5 is not a left-pane timeframe");
    assert!(matches!(err, ViewerError::TimeframeNotAllowed { .. }));
    assert_eq!(session.timeframe(PaneSide::Left), Timeframe::H1);
}

#[test]
fn same_regime_switch_keeps_visible_time_range() {
    let mut session = session();

    session.set_timeframe(PaneSide::Right, Timeframe::M1).expect("switch");

    let view = session.current_view(PaneSide::Right).expect("m1 view");
    assert_eq!((view.visible_start_idx, view.visible_end_idx), (0.0, 595.0));
    assert_eq!(session.timeframe(PaneSide::Right), Timeframe::M1);
}

#[test]
fn cross_regime_switch_anchors_on_last_visible_time() {
    let mut session = session();

    session.set_timeframe(PaneSide::Right, Timeframe::H1).expect("switch");

    let view = session.current_view(PaneSide::Right).expect("h1 view");
    assert_eq!(view.visible_end_idx, 9.0);
    assert!(session.pane(PaneSide::Right).view(Timeframe::M5).is_some());
}

#[test]
fn split_mode_halves_and_single_mode_doubles_right_pane() {
    let mut session = session();

    session.set_view_mode(ViewMode::Split).expect("split");
    let view = session.current_view(PaneSide::Right).expect("right view");
    assert_eq!(view.visible_bars, 60.0);
    assert_eq!(view.visible_end_idx, 119.0);
    assert!(session.renderer().last_scene(PaneSide::Left).is_some());

    session.set_view_mode(ViewMode::Single).expect("single");
    let view = session.current_view(PaneSide::Right).expect("right view");
    assert_eq!(view.visible_bars, 120.0);
    assert_eq!(view.visible_end_idx, 119.0);
}

#[test]
fn resize_scales_bar_count_by_width_ratio() {
    let mut session = session();
    session.resize_pane(PaneSide::Right, 1_000.0, 600.0).expect("first size");
    let before = session.renderer().commit_count;

    session.resize_pane(PaneSide::Right, 500.0, 600.0).expect("resize");

    let view = session.current_view(PaneSide::Right).expect("right view");
    assert_eq!(view.visible_bars, 60.0);
    assert_eq!(view.visible_end_idx, 119.0);
    assert_eq!(session.renderer().commit_count, before + 1);
    assert!(session.resize_pane(PaneSide::Right, 0.0, 600.0).is_err());
}

#[test]
fn queued_commands_apply_in_order() {
    let mut session = session();
    let mut queue = CommandQueue::default();
    queue.push(ViewerCommand::SetViewMode(ViewMode::Split));
    queue.push(ViewerCommand::SetPaneBehavior(PaneBehavior::FollowSnapshot));
    queue.push(ViewerCommand::SetAxisMode(AxisMode::X));
    queue.push(ViewerCommand::SetSessionDays(100));
    queue.push(ViewerCommand::SetSplitFraction(0.95));
    queue.push(ViewerCommand::Viewport {
        pane: PaneSide::Right,
        change: ViewportChange::x(40.5, 80.5),
        origin: EventOrigin::User,
    });

    let applied = session.run_queue(&mut queue).expect("queue");

    assert_eq!(applied, 6);
    assert!(queue.is_empty());
    assert_eq!(session.view_mode(), ViewMode::Split);
    assert_eq!(session.axis_mode(), AxisMode::X);
    assert_eq!(session.session_days(), 60);
    assert!((session.split_fraction() - 0.9).abs() <= 1e-12);
    let follow = session.synchronizer().follow().expect("follow");
    assert_eq!(follow.snapshot.cursor_ts, START_TS + 85 * 5 * MINUTE);
}

#[test]
fn queue_stops_at_first_failure() {
    let mut session = session();
    let mut queue = CommandQueue::default();
    queue.push(ViewerCommand::SetTimeframe {
        pane: PaneSide::Right,
        timeframe: Timeframe::MN1,
    });
    queue.push(ViewerCommand::Rerender);

    assert!(session.run_queue(&mut queue).is_err());
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pop(), Some(ViewerCommand::Rerender));
    assert_eq!(session.timeframe(PaneSide::Right), Timeframe::M5);
}

#[test]
fn stepping_walks_sorted_setups_without_wrapping() {
    let mut session = session();
    load_annotations(&mut session);
    assert_eq!(session.annotations().setups().len(), 2);

    session.step_setup(SetupStep::Next).expect("step");
    assert_eq!(session.selected_setup(), Some(0));
    session.step_setup(SetupStep::Next).expect("step");
    assert_eq!(session.selected_setup(), Some(1));
    session.step_setup(SetupStep::Next).expect("step");
    assert_eq!(session.selected_setup(), Some(1));

    session.set_sort_mode(SetupSortMode::TimeDesc);
    session.step_setup(SetupStep::Next).expect("step");
    assert_eq!(session.selected_setup(), Some(0));
}

#[test]
fn previous_without_selection_starts_at_last_setup() {
    let mut session = session();
    load_annotations(&mut session);

    session.step_setup(SetupStep::Previous).expect("step");
    assert_eq!(session.selected_setup(), Some(1));
}

#[test]
fn hiding_misses_drops_missed_setup_and_its_selection() {
    let mut session = session();
    load_annotations(&mut session);
    session.focus_on_setup(1).expect("focus");
    assert!(session.annotations().setup(1).expect("setup").is_missed);

    session.set_show_misses(false).expect("toggle");

    assert_eq!(session.annotations().setups().len(), 1);
    assert_eq!(session.selected_setup(), None);
    assert!(!session.toggles().show_misses);
}

#[test]
fn feed_reload_clears_selection_and_unparseable_feed_is_empty() {
    let mut session = session();
    load_annotations(&mut session);
    session.focus_on_setup(0).expect("focus");

    session
        .apply_feed_content(FeedKind::Trades, "demo_trades_v1.csv", "\"unterminated")
        .expect("reload");

    assert_eq!(session.selected_setup(), None);
    assert!(session.annotations().setups().is_empty());
    assert_eq!(session.annotations().boxes.len(), 2);
}

#[test]
fn observer_sees_selection_persistence_and_file_lists() {
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let mut session = ViewerSession::new(NullRenderer::default(), store(), ViewerConfig::default())
        .expect("session")
        .with_observer(Box::new(RecordingObserver(Rc::clone(&recorded))));
    session.init_default_views().expect("init");
    load_annotations(&mut session);
    session.focus_on_setup(0).expect("focus");

    let recorded = recorded.borrow();
    assert_eq!(recorded.selections, vec![Some(0)]);
    assert!(recorded.persisted >= 1);
    assert!(recorded.file_lists.contains(&(
        FeedKind::Setups,
        vec!["demo_setups.csv".to_owned()],
        Some("demo_setups.csv".to_owned()),
    )));
}

#[test]
fn right_scene_draws_setup_boxes_until_signals_are_hidden() {
    let mut session = session();
    load_annotations(&mut session);

    let annotations = session.annotations();
    let first = &annotations.setups()[0];
    let trade = annotations.setup_trade(first).expect("trade of first setup");
    assert!(trade.filled);
    assert_eq!(trade.entry_price, Some(100.5));

    let scene = session.renderer().last_scene(PaneSide::Right).expect("right scene");
    assert_eq!(scene.shapes(TraceGroup::SetupBox).count(), 2);

    session.set_show_signals(false).expect("hide signals");
    let scene = session.renderer().last_scene(PaneSide::Right).expect("right scene");
    assert_eq!(scene.shapes(TraceGroup::SetupBox).count(), 0);

    session.renderer_mut().commit_count = 0;
    session.rerender_all().expect("rerender");
    let renderer = session.into_renderer();
    assert_eq!(renderer.commit_count, 1);
}

#[test]
fn pane_size_rejects_degenerate_viewport() {
    let mut session = session();
    session.set_pane_size(PaneSide::Right, 800.0, 600.0).expect("valid size");
    assert!(matches!(
        session.set_pane_size(PaneSide::Left, 0.0, 600.0),
        Err(ViewerError::InvalidViewport { .. })
    ));
}
