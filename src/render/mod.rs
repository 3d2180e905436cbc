mod null_renderer;
mod primitives;
mod scene;

pub use null_renderer::NullRenderer;
pub use primitives::{Color, LineDash, Stroke};
pub use scene::{
    CandleTrace, Margins, Scene, SceneLayout, SceneTrace, ShapeTrace, TickLabel, TraceGroup,
};

use crate::error::ViewerResult;

/// Contract implemented by any rendering backend.
///
/// Backends receive a fully materialized `Scene` per pane, so drawing code
/// stays isolated from window math and pane synchronization. Viewport changes
/// the backend applies while drawing must come back as
/// [`crate::interaction::EventOrigin::System`] events.
pub trait SceneRenderer {
    fn commit(&mut self, scene: &Scene) -> ViewerResult<()>;
}
