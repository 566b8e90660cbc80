use crate::actions::{Action, ActionContainer, ActionKind, ArtifactSet};
use crate::prelude::{RfiError, RfiResult};
use crate::progress::ProgressListener;

/// Runs its children a fixed number of times. The sensitivity factor starts
/// at `sensitivity_start` and decreases geometrically to 1 on the last pass,
/// so early passes only catch the strongest interference.
pub struct IterationBlock {
    iterations: usize,
    sensitivity_start: f64,
    children: ActionContainer,
}

impl IterationBlock {
    pub fn new(iterations: usize, sensitivity_start: f64) -> Self {
        Self {
            iterations,
            sensitivity_start,
            children: ActionContainer::default(),
        }
    }

    pub fn add(&mut self, child: Box<dyn Action>) {
        self.children.add(child);
    }

    /// Sensitivity factor of pass `iteration` (0-based).
    pub fn sensitivity_at(&self, iteration: usize) -> f64 {
        if self.iterations <= 1 {
            return 1.0;
        }
        let remaining = (self.iterations - 1 - iteration) as f64 / (self.iterations - 1) as f64;
        self.sensitivity_start.powf(remaining)
    }
}

impl Action for IterationBlock {
    fn name(&self) -> &str {
        "Iterate"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Iteration
    }

    fn children(&self) -> &[Box<dyn Action>] {
        self.children.children()
    }

    fn initialize(&mut self) -> RfiResult<()> {
        if !(self.sensitivity_start >= 1.0) {
            return Err(RfiError::Configuration(format!(
                "iteration start sensitivity {} is below 1",
                self.sensitivity_start
            )));
        }
        self.children.initialize()
    }

    fn perform(
        &self,
        artifacts: &mut ArtifactSet,
        listener: &mut dyn ProgressListener,
    ) -> RfiResult<()> {
        let base = artifacts.sensitivity;
        let mut result = Ok(());
        for iteration in 0..self.iterations {
            listener.on_start_task(
                self,
                iteration,
                self.iterations,
                &format!("iteration {}", iteration + 1),
                1.0 / self.iterations as f64,
            );
            artifacts.sensitivity = base * self.sensitivity_at(iteration);
            result = self.children.perform(self, artifacts, listener);
            listener.on_end_task(self);
            if result.is_err() {
                break;
            }
        }
        artifacts.sensitivity = base;
        result
    }

    fn finish(&mut self) -> RfiResult<()> {
        self.children.finish()
    }
}
