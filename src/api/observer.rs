use crate::extensions::FeedKind;

use super::PersistedViewerState;

/// Host callbacks for state that lives outside the viewer core.
///
/// Every method has a no-op default so hosts implement only what they surface.
pub trait ViewerObserver {
    /// The selected setup changed (auto-selection or explicit focus).
    fn setup_selection_changed(&mut self, _setup_id: Option<usize>) {}

    /// A render committed; `state` is what should be written to storage.
    fn state_persisted(&mut self, _state: &PersistedViewerState) {}

    fn annotation_files_changed(
        &mut self,
        _kind: FeedKind,
        _files: &[String],
        _selected: Option<&str>,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ViewerObserver for NoopObserver {}
