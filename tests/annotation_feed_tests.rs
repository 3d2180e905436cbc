use replay_chart::core::primitives::parse_display_time;
use replay_chart::extensions::{
    AnnotationFeedTracker, AnnotationSet, Direction, FeedKind, FeedUpdate, SetupBox, SetupSortMode,
    Trade, parse_setup_boxes, parse_trades,
};

fn ts(text: &str) -> i64 {
    parse_display_time(text).expect("valid time")
}

#[test]
fn setup_rows_become_boxes_sorted_by_start() {
    let text = "\
direction,date_ny,signal_tf,signal_start_time,signal_end_time
sell,2024-01-03,M5,2024-01-03 11:00:00,2024-01-03 11:15:00
BUY,2024-01-02,M5,2024-01-02T10:00:00Z,2024-01-02T10:30:00Z
buy,2024-01-02,M5,not a time,2024-01-02 10:30:00
hold,2024-01-02,M5,2024-01-02 12:00:00,2024-01-02 12:30:00
";
    let boxes = parse_setup_boxes(text).expect("parse");

    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].direction, Direction::Buy);
    assert_eq!(boxes[0].setup_index, 1);
    assert_eq!(boxes[0].top_ts, ts("2024-01-02 10:00:00"));
    assert_eq!(boxes[0].signal_ts, Some(ts("2024-01-02 10:30:00")));
    assert_eq!(boxes[0].signal_tf.as_deref(), Some("M5"));
    assert_eq!(boxes[1].direction, Direction::Sell);
    assert_eq!(boxes[1].setup_index, 0);
    assert_eq!(boxes[1].date_ny, "2024-01-03");
}

#[test]
fn setup_date_falls_back_to_date_column() {
    let text = "\
direction,date,signal_start_time,signal_end_time
long,2024-02-05,2024-02-05 09:00,2024-02-05 09:20
";
    let boxes = parse_setup_boxes(text).expect("parse");
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].date_ny, "2024-02-05");
    assert_eq!(boxes[0].direction, Direction::Buy);
    assert!(boxes[0].signal_tf.is_none());
}

#[test]
fn trade_rows_parse_flags_prices_and_order() {
    let text = "\
direction,filled,entry_time,exit_time,expiration_time,entry,sl,tp_price,exit_price,result_R,setup_index,date_ny
buy,yes,2024-01-02 10:35,2024-01-02 11:30,,101.5,100.5,103.0,102.0,\"1,5\",0,2024-01-02
sell,1,2024-01-02 12:00,,,99.0,100.0,97.0,,,1,2024-01-02
sell,false,,,2024-01-02 09:50,99.5,100.2,98.1,,,2,2024-01-02
";
    let trades = parse_trades(text).expect("parse");

    assert_eq!(trades.len(), 2);
    let missed = &trades[0];
    assert!(missed.is_missed());
    assert_eq!(missed.reference_ts(), Some(ts("2024-01-02 09:50")));
    assert_eq!(missed.setup_index, Some(2));

    let filled = &trades[1];
    assert!(filled.filled);
    assert_eq!(filled.direction, Some(Direction::Buy));
    assert_eq!(filled.entry_price, Some(101.5));
    assert_eq!(filled.sl_price, Some(100.5));
    assert_eq!(filled.tp_price, Some(103.0));
    assert_eq!(filled.exit_price, Some(102.0));
    assert_eq!(filled.result_r, Some(1.5));
}

#[test]
fn feed_kinds_match_file_names() {
    assert!(FeedKind::Setups.matches_file("run_setups_2024.csv"));
    assert!(FeedKind::Setups.matches_file("RUN_SETUPS.CSV"));
    assert!(!FeedKind::Setups.matches_file("run_setups.txt"));
    assert!(FeedKind::Trades.matches_file("run_trades_a.csv"));
    assert!(!FeedKind::Trades.matches_file("run_trades.csv"));
    assert!(!FeedKind::Trades.matches_file("run_setups_2024.csv"));
}

#[test]
fn tracker_keeps_selection_until_file_disappears() {
    let mut tracker = AnnotationFeedTracker::default();

    assert!(tracker.update_listing(&["b_setups.csv", "a_setups.csv", "x_trades_1.csv"]));
    assert_eq!(tracker.files(FeedKind::Setups), ["a_setups.csv", "b_setups.csv"]);
    assert_eq!(tracker.selected(FeedKind::Setups), Some("a_setups.csv"));

    tracker.select(FeedKind::Setups, Some("b_setups.csv".to_owned()));
    assert!(!tracker.update_listing(&["a_setups.csv", "b_setups.csv", "x_trades_1.csv"]));
    assert_eq!(tracker.selected(FeedKind::Setups), Some("b_setups.csv"));

    assert!(tracker.update_listing(&["a_setups.csv", "x_trades_1.csv"]));
    assert_eq!(tracker.selected(FeedKind::Setups), Some("a_setups.csv"));
}

#[test]
fn tracker_reports_only_real_content_changes() {
    let mut tracker = AnnotationFeedTracker::default();
    tracker.update_listing(&["a_setups.csv"]);

    assert_eq!(tracker.offer_content(FeedKind::Setups, "old_setups.csv", "x"), FeedUpdate::Stale);
    assert_eq!(tracker.offer_content(FeedKind::Setups, "a_setups.csv", "v1"), FeedUpdate::Changed);
    assert_eq!(tracker.offer_content(FeedKind::Setups, "a_setups.csv", "v1"), FeedUpdate::Unchanged);
    assert_eq!(tracker.offer_content(FeedKind::Setups, "a_setups.csv", "v2"), FeedUpdate::Changed);
    assert_eq!(tracker.offer_failure(FeedKind::Setups, "a_setups.csv"), FeedUpdate::Changed);
    assert_eq!(tracker.offer_failure(FeedKind::Setups, "a_setups.csv"), FeedUpdate::Unchanged);
    assert_eq!(tracker.offer_content(FeedKind::Setups, "a_setups.csv", "v2"), FeedUpdate::Changed);
}

fn set_with_results() -> AnnotationSet {
    let boxes = vec![
        SetupBox::new(Direction::Buy, ts("2024-01-02 09:00"), ts("2024-01-02 09:10"), 0),
        SetupBox::new(Direction::Sell, ts("2024-01-02 10:00"), ts("2024-01-02 10:10"), 1),
        SetupBox::new(Direction::Buy, ts("2024-01-02 11:00"), ts("2024-01-02 11:10"), 2),
    ];
    let trade = |setup_index: usize, filled: bool, result_r: Option<f64>| Trade {
        filled,
        result_r,
        setup_index: Some(setup_index),
        ..Trade::default()
    };
    let trades = vec![
        trade(0, true, Some(-1.0)),
        trade(1, true, Some(2.0)),
        trade(2, false, None),
    ];
    AnnotationSet::new(boxes, trades)
}

#[test]
fn setups_pair_trades_with_boxes() {
    let mut set = set_with_results();
    set.rebuild_setups(true);

    assert_eq!(set.setups().len(), 3);
    let sell = set.setup(1).expect("setup");
    assert_eq!(sell.direction, Direction::Sell);
    assert_eq!(sell.signal_ts, ts("2024-01-02 10:10"));
    assert!(set.setup(2).expect("setup").is_missed);

    set.rebuild_setups(false);
    assert_eq!(set.setups().len(), 2);
}

#[test]
fn sort_modes_order_setups() {
    let mut set = set_with_results();
    set.rebuild_setups(true);
    let ids = |mode| -> Vec<usize> { set.sorted_setups(mode).iter().map(|s| s.id).collect() };

    assert_eq!(ids(SetupSortMode::TimeAsc), vec![0, 1, 2]);
    assert_eq!(ids(SetupSortMode::TimeDesc), vec![2, 1, 0]);
    assert_eq!(ids(SetupSortMode::DirLongShort), vec![2, 0, 1]);
    assert_eq!(ids(SetupSortMode::DirShortLong), vec![1, 2, 0]);
    assert_eq!(ids(SetupSortMode::RDesc), vec![1, 0, 2]);
    assert_eq!(ids(SetupSortMode::RAsc), vec![0, 1, 2]);
}

#[test]
fn marking_snapshot_box_is_exclusive() {
    let mut set = set_with_results();
    set.mark_snapshot_box(Some(1));
    assert_eq!(
        set.boxes.iter().map(|b| b.is_snapshot_active).collect::<Vec<_>>(),
        vec![false, true, false]
    );
    set.mark_snapshot_box(None);
    assert!(set.boxes.iter().all(|b| !b.is_snapshot_active));
}
