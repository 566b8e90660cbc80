use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::prelude::{RfiError, RfiResult};
use crate::progress::ProgressListener;
use crate::statistics::{FlagCountReport, StatisticsMessage};
use ndarray::Axis;

/// Reports the flag occupancy of the current baseline to the statistics
/// accumulator.
#[derive(Default)]
pub struct FlagStatisticsAction;

impl FlagStatisticsAction {
    pub fn new() -> Self {
        Self
    }
}

impl Action for FlagStatisticsAction {
    fn name(&self) -> &str {
        "Flag statistics"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::FlagStatistics
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        if artifacts.contaminated.is_empty() {
            return Ok(());
        }
        let (antenna1, antenna2, band) = artifacts.current_baseline().ok_or_else(|| {
            RfiError::Usage("flag statistics need the metadata of the current baseline".into())
        })?;

        let mask = artifacts.contaminated.single_mask();
        let count_along = |axis: Axis| -> Vec<usize> {
            mask.view()
                .axis_iter(axis)
                .map(|line| line.iter().filter(|&&flag| flag).count())
                .collect()
        };
        let report = FlagCountReport {
            antenna1,
            antenna2,
            band,
            flagged_per_channel: count_along(Axis(1)),
            flagged_per_time: count_along(Axis(0)),
            time_steps: mask.time_steps(),
            channels: mask.channels(),
        };
        artifacts.record_statistics(StatisticsMessage::FlagCounts(report))
    }
}
