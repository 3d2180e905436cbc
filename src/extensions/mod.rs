pub mod annotation_feed;
pub mod annotations;

pub use annotation_feed::{AnnotationFeedTracker, FeedKind, FeedUpdate, parse_setup_boxes, parse_trades};
pub use annotations::{
    AnnotationSet, Direction, Setup, SetupBox, SetupSortMode, Trade, find_box_for_trade,
};
