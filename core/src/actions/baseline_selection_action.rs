use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::algorithms::{BaselineSelector, SelectionResult, SelectorParams};
use crate::model::Mask;
use crate::pipeline::lock;
use crate::prelude::{RfiError, RfiResult};
use crate::progress::ProgressListener;
use crate::statistics::{BaselineSelectionRecord, StatisticsMessage};
use crate::telemetry::LogManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Record the current baseline's flag totals; runs once per baseline.
    Prepare,
    /// Run the selector over everything recorded; runs once after the
    /// baseline loop.
    Evaluate,
}

pub struct BaselineSelectionAction {
    mode: SelectionMode,
    selector: BaselineSelector,
    flag_bad_baselines: bool,
    logger: LogManager,
}

impl BaselineSelectionAction {
    pub fn prepare() -> Self {
        Self::new(SelectionMode::Prepare, SelectorParams::default(), false)
    }

    /// With `flag_bad_baselines`, every selected baseline is written back to
    /// the data source fully flagged.
    pub fn evaluate(params: SelectorParams, flag_bad_baselines: bool) -> Self {
        Self::new(SelectionMode::Evaluate, params, flag_bad_baselines)
    }

    fn new(mode: SelectionMode, params: SelectorParams, flag_bad_baselines: bool) -> Self {
        Self {
            mode,
            selector: BaselineSelector::new(params),
            flag_bad_baselines,
            logger: LogManager::new("BaselineSelection"),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    fn prepare_baseline(&self, artifacts: &mut ArtifactSet) -> RfiResult<()> {
        if artifacts.contaminated.is_empty() {
            return Ok(());
        }
        let metadata = artifacts.metadata.clone().ok_or_else(|| {
            RfiError::Usage("baseline selection needs the metadata of the current baseline".into())
        })?;
        let (antenna1, antenna2) = metadata.antenna_pair();
        let record = BaselineSelectionRecord {
            antenna1,
            antenna2,
            band: metadata.band.index,
            length: metadata.baseline_length(),
            angle: metadata.baseline_angle(),
            flagged_count: artifacts.contaminated.flagged_count(),
            total_count: artifacts.contaminated.sample_count(),
        };
        artifacts.record_statistics(StatisticsMessage::Baseline(record))
    }

    fn evaluate_baselines(&self, artifacts: &mut ArtifactSet) -> RfiResult<()> {
        let result = self.selector.select_statistics(&artifacts.statistics.baselines);
        let stations = result.imply_stations(self.selector.params().station_ratio);
        self.logger.record(&format!(
            "{} of {} baselines marked bad after {} iteration(s); bad stations: {:?}",
            result.bad_count(),
            result.evaluations.len(),
            result.iterations,
            stations
        ));
        for bad in result.bad_baselines() {
            self.logger.detail(&format!(
                "{} x {} (band {}): ratio {:.4}, expected {:.4}",
                bad.antenna1,
                bad.antenna2,
                bad.band,
                bad.ratio,
                bad.expected.unwrap_or(0.0)
            ));
        }
        if self.flag_bad_baselines && result.bad_count() > 0 {
            self.flag_in_source(artifacts, &result)?;
        }
        artifacts.selection = Some(result);
        Ok(())
    }

    fn flag_in_source(&self, artifacts: &ArtifactSet, result: &SelectionResult) -> RfiResult<()> {
        let source = artifacts.source.as_ref().ok_or_else(|| {
            RfiError::Usage("flagging bad baselines needs a data source".into())
        })?;
        let per_band = self.selector.params().per_band;
        let bad: BTreeSet<(usize, usize, Option<usize>)> = result
            .bad_baselines()
            .map(|e| (e.antenna1, e.antenna2, per_band.then_some(e.band)))
            .collect();

        let mut source = lock(source);
        let shape = source.shape_hint();
        let masks = vec![Mask::set_all(shape.time_steps, shape.channels); shape.polarizations];
        let mut index = source.start_index()?;
        let mut written = 0;
        while index.is_valid() {
            let (antenna1, antenna2) = index.antenna_pair();
            if bad.contains(&(antenna1, antenna2, per_band.then_some(index.band()))) {
                source.write_flags(index.as_ref(), &masks)?;
                written += 1;
            }
            index.next();
        }
        self.logger
            .record(&format!("flagged {} bad baseline(s) in the data source", written));
        Ok(())
    }
}

impl Action for BaselineSelectionAction {
    fn name(&self) -> &str {
        match self.mode {
            SelectionMode::Prepare => "Baseline selection (prepare)",
            SelectionMode::Evaluate => "Baseline selection (evaluate)",
        }
    }

    fn kind(&self) -> ActionKind {
        ActionKind::BaselineSelection
    }

    fn initialize(&mut self) -> RfiResult<()> {
        self.selector.params().validate()
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        match self.mode {
            SelectionMode::Prepare => self.prepare_baseline(artifacts),
            SelectionMode::Evaluate => self.evaluate_baselines(artifacts),
        }
    }
}
