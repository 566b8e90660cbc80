use crate::actions::{Action, ActionContainer, ActionKind, ArtifactSet};
use crate::prelude::RfiResult;
use crate::progress::ProgressListener;

/// Plain sequence of actions; the root of every strategy.
pub struct ActionBlock {
    name: String,
    children: ActionContainer,
}

impl ActionBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: ActionContainer::default(),
        }
    }

    pub fn with_children(name: impl Into<String>, children: Vec<Box<dyn Action>>) -> Self {
        Self {
            name: name.into(),
            children: ActionContainer::new(children),
        }
    }

    pub fn add(&mut self, child: Box<dyn Action>) {
        self.children.add(child);
    }
}

impl Action for ActionBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Block
    }

    fn children(&self) -> &[Box<dyn Action>] {
        self.children.children()
    }

    fn initialize(&mut self) -> RfiResult<()> {
        self.children.initialize()
    }

    fn perform(
        &self,
        artifacts: &mut ArtifactSet,
        listener: &mut dyn ProgressListener,
    ) -> RfiResult<()> {
        self.children.perform(self, artifacts, listener)
    }

    fn finish(&mut self) -> RfiResult<()> {
        self.children.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{EventLog, Tracer, RecordingListener};
    use crate::actions::run_strategy;
    use crate::prelude::RfiError;

    #[test]
    fn lifecycle_runs_top_down_then_bottom_up() {
        let events = EventLog::default();
        let mut inner = ActionBlock::new("inner");
        inner.add(Box::new(Tracer::new("leaf", &events)));
        let mut root = ActionBlock::new("root");
        root.add(Box::new(Tracer::new("first", &events)));
        root.add(Box::new(inner));

        run_strategy(&mut root, &mut ArtifactSet::new(), &mut RecordingListener::default())
            .unwrap();
        assert_eq!(
            events.take(),
            vec![
                "init first",
                "init leaf",
                "perform first",
                "perform leaf",
                "finish first",
                "finish leaf",
            ]
        );
    }

    #[test]
    fn leaf_failure_is_reported_once_and_stops_the_block() {
        let events = EventLog::default();
        let mut inner = ActionBlock::new("inner");
        inner.add(Box::new(Tracer::failing("broken", &events)));
        let mut root = ActionBlock::new("root");
        root.add(Box::new(inner));
        root.add(Box::new(Tracer::new("after", &events)));

        let mut listener = RecordingListener::default();
        let result = root.perform(&mut ArtifactSet::new(), &mut listener);
        assert!(matches!(result, Err(RfiError::InvalidInput(_))));
        assert_eq!(listener.exceptions, vec!["broken".to_string()]);
        assert_eq!(events.take(), vec!["perform broken"]);
    }

    #[test]
    fn children_are_inspectable() {
        let events = EventLog::default();
        let root = ActionBlock::with_children(
            "root",
            vec![
                Box::new(Tracer::new("a", &events)) as Box<dyn Action>,
                Box::new(Tracer::new("b", &events)),
            ],
        );
        let names: Vec<&str> = root.children().iter().map(|child| child.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(root.kind(), ActionKind::Block);
        assert!(!root.is_leaf());
    }
}
