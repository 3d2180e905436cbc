use crate::core::PaneSide;
use crate::error::ViewerResult;
use crate::render::{Scene, SceneRenderer};

/// No-op renderer used by tests and headless sessions.
///
/// It still validates every scene and keeps the last one per pane so callers
/// can inspect what would have been drawn.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub commit_count: usize,
    pub last_left: Option<Scene>,
    pub last_right: Option<Scene>,
}

impl NullRenderer {
    #[must_use]
    pub fn last_scene(&self, pane: PaneSide) -> Option<&Scene> {
        match pane {
            PaneSide::Left => self.last_left.as_ref(),
            PaneSide::Right => self.last_right.as_ref(),
        }
    }
}

impl SceneRenderer for NullRenderer {
    fn commit(&mut self, scene: &Scene) -> ViewerResult<()> {
        scene.validate()?;
        self.commit_count += 1;
        match scene.pane {
            PaneSide::Left => self.last_left = Some(scene.clone()),
            PaneSide::Right => self.last_right = Some(scene.clone()),
        }
        Ok(())
    }
}
