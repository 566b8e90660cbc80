//! Default flagging strategy: the standard action tree, built from one
//! serializable configuration.

use crate::actions::{
    ActionBlock, BaselineSelectionAction, FlagStatisticsAction, FlaggingMode,
    ForEachBaselineAction, HighPassFilterAction, IterationBlock, MorphologyAction,
    SetFlaggingAction, ThresholdAction, WriteFlagsAction,
};
use crate::algorithms::{HighPassParams, MorphologyParams, SelectorParams, ThresholdParams};
use crate::pipeline::{BaselineSelection, PipelineConfig};
use crate::prelude::{RfiError, RfiResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub threshold: ThresholdParams,
    pub highpass: HighPassParams,
    pub morphology: MorphologyParams,
    pub selector: SelectorParams,
    pub pipeline: PipelineConfig,
    pub selection: BaselineSelection,
    /// Passes of threshold plus high-pass refinement before the final
    /// threshold.
    pub iterations: usize,
    pub sensitivity_start: f64,
    pub per_polarization: bool,
    pub write_flags: bool,
    /// Write fully flagged masks for every baseline the selector marks bad.
    pub flag_bad_baselines: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdParams::default(),
            highpass: HighPassParams::default(),
            morphology: MorphologyParams::default(),
            selector: SelectorParams::default(),
            pipeline: PipelineConfig::default(),
            selection: BaselineSelection::CrossCorrelations,
            iterations: 2,
            sensitivity_start: 4.0,
            per_polarization: false,
            write_flags: true,
            flag_bad_baselines: false,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> RfiResult<()> {
        if self.iterations == 0 {
            return Err(RfiError::Configuration(
                "a strategy needs at least one iteration".into(),
            ));
        }
        if self.selection.needs_current_baseline() {
            return Err(RfiError::Configuration(format!(
                "{:?} cannot drive a top-level strategy",
                self.selection
            )));
        }
        self.pipeline.validate()
    }
}

pub struct Strategy;

impl Strategy {
    /// Assembles
    ///
    /// ```text
    /// strategy
    /// ├── for each baseline
    /// │   ├── set flagging (from original)
    /// │   ├── iterate { threshold, high-pass filter }
    /// │   ├── threshold
    /// │   ├── morphology
    /// │   ├── flag statistics
    /// │   ├── baseline selection (prepare)
    /// │   └── write flags (optional)
    /// └── baseline selection (evaluate)
    /// ```
    pub fn build(config: &StrategyConfig) -> RfiResult<ActionBlock> {
        config.validate()?;

        let mut iteration = IterationBlock::new(config.iterations, config.sensitivity_start);
        iteration.add(Box::new(ThresholdAction::new(
            config.threshold.clone(),
            config.per_polarization,
        )));
        iteration.add(Box::new(HighPassFilterAction::new(config.highpass.clone())));

        let mut per_baseline = ForEachBaselineAction::new(config.selection, config.pipeline.clone());
        per_baseline.add(Box::new(SetFlaggingAction::new(FlaggingMode::FromOriginal)));
        per_baseline.add(Box::new(iteration));
        per_baseline.add(Box::new(ThresholdAction::new(
            config.threshold.clone(),
            config.per_polarization,
        )));
        per_baseline.add(Box::new(MorphologyAction::new(config.morphology.clone())));
        per_baseline.add(Box::new(FlagStatisticsAction::new()));
        per_baseline.add(Box::new(BaselineSelectionAction::prepare()));
        if config.write_flags {
            per_baseline.add(Box::new(WriteFlagsAction::new()));
        }

        let mut root = ActionBlock::new("Default strategy");
        root.add(Box::new(per_baseline));
        root.add(Box::new(BaselineSelectionAction::evaluate(
            config.selector.clone(),
            config.flag_bad_baselines,
        )));
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{line_config, synthetic_source};
    use crate::actions::{run_strategy, Action, ActionKind, ArtifactSet};
    use crate::imagesets::synthetic::NoisyAntenna;
    use crate::progress::NullListener;

    fn kinds(action: &dyn Action) -> Vec<ActionKind> {
        action.children().iter().map(|child| child.kind()).collect()
    }

    fn small_config(threads: usize) -> StrategyConfig {
        StrategyConfig {
            pipeline: PipelineConfig {
                threads: Some(threads),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn builds_the_standard_tree() {
        let root = Strategy::build(&StrategyConfig::default()).unwrap();
        assert_eq!(
            kinds(&root),
            vec![ActionKind::ForEachBaseline, ActionKind::BaselineSelection]
        );
        let per_baseline = root.children()[0].as_ref();
        assert_eq!(
            kinds(per_baseline),
            vec![
                ActionKind::SetFlagging,
                ActionKind::Iteration,
                ActionKind::Threshold,
                ActionKind::Morphology,
                ActionKind::FlagStatistics,
                ActionKind::BaselineSelection,
                ActionKind::WriteFlags,
            ]
        );
        assert_eq!(
            kinds(per_baseline.children()[1].as_ref()),
            vec![ActionKind::Threshold, ActionKind::HighPassFilter]
        );
    }

    #[test]
    fn write_flags_is_optional() {
        let config = StrategyConfig {
            write_flags: false,
            ..Default::default()
        };
        let root = Strategy::build(&config).unwrap();
        assert!(!kinds(root.children()[0].as_ref()).contains(&ActionKind::WriteFlags));
    }

    #[test]
    fn rejects_selections_that_need_a_current_baseline() {
        let config = StrategyConfig {
            selection: BaselineSelection::CurrentBaseline,
            ..Default::default()
        };
        assert!(matches!(
            Strategy::build(&config),
            Err(RfiError::Configuration(_))
        ));
    }

    #[test]
    fn flags_an_injected_line_end_to_end() {
        let (source, store) = synthetic_source(4, line_config(96, 32));
        let mut root = Strategy::build(&small_config(3)).unwrap();
        let mut artifacts = ArtifactSet::with_source(source);
        run_strategy(&mut root, &mut artifacts, &mut NullListener).unwrap();

        let store = store.lock().unwrap();
        assert_eq!(store.len(), 6);
        for masks in store.values() {
            let mask = &masks[0];
            let line = (0..96).filter(|&time| mask.is_set(time, 10)).count();
            assert!(line >= 90, "line flagged at {} of 96 time steps", line);
        }

        let report = artifacts.pipeline_report.as_ref().unwrap();
        assert_eq!((report.selected, report.processed), (6, 6));
        assert_eq!(artifacts.statistics.flags.baselines_reported, 6);
        assert_eq!(artifacts.statistics.baselines.len(), 6);
        assert!(artifacts.selection.is_some());
    }

    #[test]
    fn noisy_antenna_is_found_by_the_selector() {
        let mut scenario = line_config(64, 32);
        scenario.lines.clear();
        scenario.noisy_antennas = vec![NoisyAntenna {
            antenna: 2,
            affected_channels: 8,
            amplitude: 30.0,
        }];
        let (source, _) = synthetic_source(6, scenario);
        let config = StrategyConfig {
            write_flags: false,
            ..small_config(4)
        };
        let mut root = Strategy::build(&config).unwrap();
        let mut artifacts = ArtifactSet::with_source(source);
        run_strategy(&mut root, &mut artifacts, &mut NullListener).unwrap();

        let selection = artifacts.selection.unwrap();
        assert!(selection.bad_count() > 0);
        assert!(selection
            .bad_baselines()
            .all(|bad| bad.antenna1 == 2 || bad.antenna2 == 2));
    }
}
