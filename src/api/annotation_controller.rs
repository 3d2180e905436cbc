use tracing::{debug, warn};

use crate::error::ViewerResult;
use crate::extensions::{FeedKind, FeedUpdate, parse_setup_boxes, parse_trades};
use crate::render::SceneRenderer;

use super::ViewerSession;

impl<R: SceneRenderer> ViewerSession<R> {
    /// Feeds a directory listing to the annotation tracker and reports changed
    /// file lists to the observer.
    pub fn update_file_listing<S: AsRef<str>>(&mut self, names: &[S]) -> bool {
        let changed = self.feeds.update_listing(names);
        if changed {
            for kind in [FeedKind::Setups, FeedKind::Trades] {
                self.notify_feed_files(kind);
            }
        }
        changed
    }

    pub fn select_feed_file(&mut self, kind: FeedKind, filename: Option<String>) {
        self.feeds.select(kind, filename);
        self.notify_feed_files(kind);
    }

    fn notify_feed_files(&mut self, kind: FeedKind) {
        let Self { feeds, observer, .. } = self;
        observer.annotation_files_changed(kind, feeds.files(kind), feeds.selected(kind));
    }

    /// Applies fetched feed content when it is new for the selected file.
    ///
    /// Unparseable content is logged and treated as an empty feed. Any change
    /// drops the pinned snapshot and the selection, since setup ids are rebuilt.
    pub fn apply_feed_content(&mut self, kind: FeedKind, filename: &str, text: &str) -> ViewerResult<()> {
        match self.feeds.offer_content(kind, filename, text) {
            FeedUpdate::Stale | FeedUpdate::Unchanged => return Ok(()),
            FeedUpdate::Changed => {}
        }
        match kind {
            FeedKind::Setups => {
                self.annotations.boxes = parse_setup_boxes(text).unwrap_or_else(|err| {
                    warn!(filename, error = %err, "setup feed rejected");
                    Vec::new()
                });
            }
            FeedKind::Trades => {
                self.annotations.trades = parse_trades(text).unwrap_or_else(|err| {
                    warn!(filename, error = %err, "trade feed rejected");
                    Vec::new()
                });
            }
        }
        debug!(
            ?kind,
            filename,
            boxes = self.annotations.boxes.len(),
            trades = self.annotations.trades.len(),
            "annotation feed reloaded"
        );
        self.reload_annotations()
    }

    /// Drops the layer of a feed whose selected file could not be fetched.
    pub fn apply_feed_failure(&mut self, kind: FeedKind, filename: &str) -> ViewerResult<()> {
        if self.feeds.offer_failure(kind, filename) != FeedUpdate::Changed {
            return Ok(());
        }
        warn!(?kind, filename, "annotation feed unavailable; layer cleared");
        match kind {
            FeedKind::Setups => self.annotations.boxes.clear(),
            FeedKind::Trades => self.annotations.trades.clear(),
        }
        self.reload_annotations()
    }

    fn reload_annotations(&mut self) -> ViewerResult<()> {
        self.clear_snapshot(true);
        self.annotations.rebuild_setups(self.toggles.show_misses);
        self.rerender_all()
    }
}
