use tracing::{trace, warn};

use crate::error::ViewerResult;
use crate::interaction::{CommandQueue, ViewerCommand};
use crate::render::SceneRenderer;

use super::ViewerSession;

impl<R: SceneRenderer> ViewerSession<R> {
    /// Routes one host command to the matching session operation.
    pub fn dispatch(&mut self, command: ViewerCommand) -> ViewerResult<()> {
        match command {
            ViewerCommand::Viewport {
                pane,
                change,
                origin,
            } => self.handle_viewport_event(pane, change, origin),
            ViewerCommand::SetTimeframe { pane, timeframe } => self.set_timeframe(pane, timeframe),
            ViewerCommand::SetViewMode(mode) => self.set_view_mode(mode),
            ViewerCommand::SetPaneBehavior(behavior) => self.set_pane_behavior(behavior),
            ViewerCommand::SetAxisMode(mode) => self.set_axis_mode(mode),
            ViewerCommand::FocusSetup(setup_id) => self.focus_on_setup(setup_id),
            ViewerCommand::StepSetup(step) => self.step_setup(step),
            ViewerCommand::ResizePane {
                pane,
                width_px,
                height_px,
            } => self.resize_pane(pane, width_px, height_px),
            ViewerCommand::SetShowMisses(show) => self.set_show_misses(show),
            ViewerCommand::SetShowSignals(show) => self.set_show_signals(show),
            ViewerCommand::SetCandleHover(enabled) => self.set_candle_hover(enabled),
            ViewerCommand::SetSessionDays(days) => self.set_session_days(days),
            ViewerCommand::SetSortMode(mode) => {
                self.set_sort_mode(mode);
                Ok(())
            }
            ViewerCommand::SetSplitFraction(fraction) => {
                self.set_split_fraction(fraction);
                Ok(())
            }
            ViewerCommand::FileListing(names) => {
                self.update_file_listing(&names);
                Ok(())
            }
            ViewerCommand::SelectFeedFile { kind, filename } => {
                self.select_feed_file(kind, filename);
                Ok(())
            }
            ViewerCommand::FeedContent {
                kind,
                filename,
                text,
            } => self.apply_feed_content(kind, &filename, &text),
            ViewerCommand::FeedFailure { kind, filename } => self.apply_feed_failure(kind, &filename),
            ViewerCommand::Rerender => self.rerender_all(),
        }
    }

    /// Drains `queue` in order, stopping at the first failing command.
    ///
    /// The failing command is consumed and its error returned; commands after
    /// it stay queued. Returns the number of commands applied.
    pub fn run_queue(&mut self, queue: &mut CommandQueue) -> ViewerResult<usize> {
        let mut applied = 0;
        while let Some(command) = queue.pop() {
            trace!(?command, "dispatching command");
            if let Err(err) = self.dispatch(command) {
                warn!(applied, pending = queue.len(), error = %err, "command failed; queue halted");
                return Err(err);
            }
            applied += 1;
        }
        Ok(applied)
    }
}
