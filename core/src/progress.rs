//! Progress reporting hooks called while an action tree runs.

use crate::actions::Action;
use crate::prelude::RfiError;
use log::{debug, error, info};

/// Receives task and failure notifications from running actions.
///
/// Weighting nested tasks into an overall percentage is left to the
/// implementation.
pub trait ProgressListener: Send {
    fn on_start_task(
        &mut self,
        action: &dyn Action,
        task_no: usize,
        task_count: usize,
        description: &str,
        weight: f64,
    );
    fn on_end_task(&mut self, action: &dyn Action);
    fn on_progress(&mut self, action: &dyn Action, progress: usize, max_progress: usize);
    fn on_exception(&mut self, action: &dyn Action, error: &RfiError);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl ProgressListener for NullListener {
    fn on_start_task(&mut self, _: &dyn Action, _: usize, _: usize, _: &str, _: f64) {}
    fn on_end_task(&mut self, _: &dyn Action) {}
    fn on_progress(&mut self, _: &dyn Action, _: usize, _: usize) {}
    fn on_exception(&mut self, _: &dyn Action, _: &RfiError) {}
}

/// Forwards notifications to the `log` facade, reporting progress at most
/// once per `step_percent`.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    step_percent: usize,
    last_percent: Option<usize>,
}

impl LoggingListener {
    pub fn new(step_percent: usize) -> Self {
        Self {
            step_percent: step_percent.max(1),
            last_percent: None,
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressListener for LoggingListener {
    fn on_start_task(
        &mut self,
        action: &dyn Action,
        task_no: usize,
        task_count: usize,
        description: &str,
        _weight: f64,
    ) {
        debug!(
            "{}: task {}/{} {}",
            action.name(),
            task_no + 1,
            task_count,
            description
        );
    }

    fn on_end_task(&mut self, action: &dyn Action) {
        debug!("{}: task finished", action.name());
    }

    fn on_progress(&mut self, action: &dyn Action, progress: usize, max_progress: usize) {
        if max_progress == 0 {
            return;
        }
        let percent = progress * 100 / max_progress;
        let bucket = percent / self.step_percent;
        if self.last_percent != Some(bucket) {
            self.last_percent = Some(bucket);
            info!(
                "{}: {}/{} ({}%)",
                action.name(),
                progress,
                max_progress,
                percent
            );
        }
    }

    fn on_exception(&mut self, action: &dyn Action, error: &RfiError) {
        error!("{} failed: {}", action.name(), error);
    }
}
