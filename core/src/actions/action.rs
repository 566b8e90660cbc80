use crate::actions::ArtifactSet;
use crate::prelude::RfiResult;
use crate::progress::ProgressListener;

/// Node types of a strategy tree, used for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Block,
    Iteration,
    ForEachBaseline,
    SetFlagging,
    Threshold,
    HighPassFilter,
    Morphology,
    FlagStatistics,
    BaselineSelection,
    WriteFlags,
}

/// A node of a strategy tree.
///
/// `initialize` runs once top-down before any `perform`, and `finish` runs once
/// bottom-up afterwards. `perform` takes `&self` so a single tree can be run
/// by several pipeline workers at the same time.
pub trait Action: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ActionKind;

    fn children(&self) -> &[Box<dyn Action>] {
        &[]
    }

    fn initialize(&mut self) -> RfiResult<()> {
        Ok(())
    }

    fn perform(
        &self,
        artifacts: &mut ArtifactSet,
        listener: &mut dyn ProgressListener,
    ) -> RfiResult<()>;

    fn finish(&mut self) -> RfiResult<()> {
        Ok(())
    }

    fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }
}

/// Ordered children of a composite node.
#[derive(Default)]
pub struct ActionContainer {
    children: Vec<Box<dyn Action>>,
}

impl ActionContainer {
    pub fn new(children: Vec<Box<dyn Action>>) -> Self {
        Self { children }
    }

    pub fn add(&mut self, child: Box<dyn Action>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Box<dyn Action>] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn initialize(&mut self) -> RfiResult<()> {
        self.children.iter_mut().try_for_each(|child| child.initialize())
    }

    pub fn finish(&mut self) -> RfiResult<()> {
        self.children.iter_mut().try_for_each(|child| child.finish())
    }

    /// Runs every child in order on the same artifacts. A failing leaf is
    /// reported through `listener` before the error is passed on; failures of
    /// composite children were already reported further down.
    pub fn perform(
        &self,
        owner: &dyn Action,
        artifacts: &mut ArtifactSet,
        listener: &mut dyn ProgressListener,
    ) -> RfiResult<()> {
        let count = self.children.len();
        for (task_no, child) in self.children.iter().enumerate() {
            listener.on_start_task(owner, task_no, count, child.name(), 1.0 / count as f64);
            let result = child.perform(artifacts, listener);
            if let Err(err) = &result {
                if child.is_leaf() {
                    listener.on_exception(child.as_ref(), err);
                }
            }
            listener.on_end_task(owner);
            result?;
        }
        Ok(())
    }
}

/// Initializes, performs and finishes `root`. `finish` runs even when
/// `perform` fails so accumulators are always flushed.
pub fn run_strategy(
    root: &mut dyn Action,
    artifacts: &mut ArtifactSet,
    listener: &mut dyn ProgressListener,
) -> RfiResult<()> {
    root.initialize()?;
    let performed = root.perform(artifacts, listener);
    let finished = root.finish();
    performed.and(finished)
}
