use crate::actions::{Action, ActionContainer, ActionKind, ArtifactSet};
use crate::pipeline::{BaselinePipeline, BaselineSelection, PipelineConfig};
use crate::prelude::RfiResult;
use crate::progress::ProgressListener;
use crate::telemetry::LogManager;

/// Runs its children once for every selected baseline of the data source,
/// spread over the pipeline's worker threads.
///
/// Failures inside the children are isolated per baseline: they are reported
/// to the listener, the remaining baselines still run, and one aggregate error
/// is returned at the end. The artifacts are replaced by the merged result in
/// both cases.
pub struct ForEachBaselineAction {
    selection: BaselineSelection,
    config: PipelineConfig,
    children: ActionContainer,
    logger: LogManager,
}

impl ForEachBaselineAction {
    pub fn new(selection: BaselineSelection, config: PipelineConfig) -> Self {
        Self {
            selection,
            config,
            children: ActionContainer::default(),
            logger: LogManager::new("ForEachBaseline"),
        }
    }

    pub fn add(&mut self, child: Box<dyn Action>) {
        self.children.add(child);
    }

    pub fn selection(&self) -> BaselineSelection {
        self.selection
    }
}

impl Action for ForEachBaselineAction {
    fn name(&self) -> &str {
        "For each baseline"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::ForEachBaseline
    }

    fn children(&self) -> &[Box<dyn Action>] {
        self.children.children()
    }

    fn initialize(&mut self) -> RfiResult<()> {
        self.config.validate()?;
        self.children.initialize()
    }

    fn perform(
        &self,
        artifacts: &mut ArtifactSet,
        listener: &mut dyn ProgressListener,
    ) -> RfiResult<()> {
        listener.on_start_task(self, 0, 1, "processing baselines", 1.0);
        let pipeline = BaselinePipeline::new(self, &self.config, self.selection, &self.logger);
        let outcome = pipeline.run(artifacts, listener, |view, quiet| {
            self.children.perform(self, view, quiet)
        });
        listener.on_end_task(self);

        let outcome = outcome?;
        *artifacts = outcome.merged;
        artifacts.pipeline_report = Some(outcome.report);
        match outcome.failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> RfiResult<()> {
        self.children.finish()
    }
}
