use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::pipeline::lock;
use crate::prelude::{RfiError, RfiResult};
use crate::progress::ProgressListener;

/// Writes the contaminated masks of the current baseline back to the data
/// source.
#[derive(Default)]
pub struct WriteFlagsAction;

impl WriteFlagsAction {
    pub fn new() -> Self {
        Self
    }
}

impl Action for WriteFlagsAction {
    fn name(&self) -> &str {
        "Write flags"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::WriteFlags
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        let source = artifacts
            .source
            .as_ref()
            .ok_or_else(|| RfiError::Usage("writing flags needs a data source".into()))?;
        let index = artifacts
            .baseline_index
            .as_ref()
            .ok_or_else(|| RfiError::Usage("writing flags needs a current baseline".into()))?;
        lock(source).write_flags(index.as_ref(), artifacts.contaminated.masks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::synthetic_source;
    use crate::imagesets::TestSetConfig;
    use crate::model::Mask;
    use crate::progress::NullListener;

    #[test]
    fn masks_of_the_current_baseline_reach_the_source() {
        let config = TestSetConfig {
            time_steps: 8,
            channels: 4,
            ..Default::default()
        };
        let (source, store) = synthetic_source(3, config);
        let task = {
            let mut source = lock(&source);
            let index = source.start_index().unwrap();
            source.add_read_request(index.as_ref());
            source.perform_read_requests().unwrap();
            source.get_next_requested().unwrap()
        };
        let mut artifacts = ArtifactSet::with_source(source);
        artifacts.load_task(task);
        artifacts
            .contaminated
            .set_global_mask(Mask::set_all(8, 4))
            .unwrap();

        WriteFlagsAction::new()
            .perform(&mut artifacts, &mut NullListener)
            .unwrap();

        let store = store.lock().unwrap();
        let masks = &store[&(0, 1, 0)];
        assert_eq!(masks.len(), 1);
        assert!(masks[0].all_flagged());
    }

    #[test]
    fn needs_a_source_and_a_baseline() {
        let mut artifacts = ArtifactSet::new();
        let result = WriteFlagsAction::new().perform(&mut artifacts, &mut NullListener);
        assert!(matches!(result, Err(RfiError::Usage(_))));

        let (source, _) = synthetic_source(2, TestSetConfig::default());
        let mut artifacts = ArtifactSet::with_source(source);
        let result = WriteFlagsAction::new().perform(&mut artifacts, &mut NullListener);
        assert!(matches!(result, Err(RfiError::Usage(_))));
    }
}
