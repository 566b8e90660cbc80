use crate::algorithms::SelectionResult;
use crate::imagesets::{BaselineIndex, BaselineTask, SourceHandle};
use crate::model::{BaselineMetaData, SegmentedImage, TimeFrequencyData};
use crate::pipeline::PipelineReport;
use crate::prelude::RfiResult;
use crate::statistics::{AccumulatorHandle, CollectedStatistics, StatisticsMessage};
use std::fmt;
use std::sync::Arc;

/// Data products threaded through a strategy tree.
///
/// `original` is the data as read, `contaminated` is what detectors run on
/// and flag, and `revised` holds the smooth background removed from it.
/// Cloning is cheap: images and masks share storage until written.
#[derive(Clone)]
pub struct ArtifactSet {
    pub original: TimeFrequencyData,
    pub contaminated: TimeFrequencyData,
    pub revised: TimeFrequencyData,
    pub metadata: Option<Arc<BaselineMetaData>>,
    pub baseline_index: Option<Box<dyn BaselineIndex>>,
    pub source: Option<SourceHandle>,
    /// Set while a pipeline runs; statistics are then sent to its aggregator
    /// instead of being written to `statistics`.
    pub accumulator: Option<AccumulatorHandle>,
    pub statistics: CollectedStatistics,
    pub segmented: Option<SegmentedImage>,
    pub selection: Option<SelectionResult>,
    /// Multiplier on detector thresholds; iteration blocks lower it towards 1.
    pub sensitivity: f64,
    pub pipeline_report: Option<PipelineReport>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self {
            original: TimeFrequencyData::empty(),
            contaminated: TimeFrequencyData::empty(),
            revised: TimeFrequencyData::empty(),
            metadata: None,
            baseline_index: None,
            source: None,
            accumulator: None,
            statistics: CollectedStatistics::default(),
            segmented: None,
            selection: None,
            sensitivity: 1.0,
            pipeline_report: None,
        }
    }

    pub fn with_source(source: SourceHandle) -> Self {
        Self {
            source: Some(source),
            ..Self::new()
        }
    }

    /// Artifacts for flagging a single baseline outside a pipeline.
    pub fn from_data(data: TimeFrequencyData, metadata: Option<Arc<BaselineMetaData>>) -> Self {
        let mut artifacts = Self::new();
        artifacts.contaminated = data.clone();
        artifacts.original = data;
        artifacts.metadata = metadata;
        artifacts
    }

    /// Replaces the per-baseline products with a freshly read task.
    pub fn load_task(&mut self, task: BaselineTask) {
        self.contaminated = task.data.clone();
        self.original = task.data;
        self.revised = TimeFrequencyData::empty();
        self.metadata = Some(task.metadata);
        self.baseline_index = Some(task.index);
        self.segmented = None;
    }

    /// `(antenna1, antenna2, band)` of the current baseline, when known.
    pub fn current_baseline(&self) -> Option<(usize, usize, usize)> {
        self.metadata.as_ref().map(|metadata| {
            let (antenna1, antenna2) = metadata.antenna_pair();
            (antenna1, antenna2, metadata.band.index)
        })
    }

    pub fn record_statistics(&mut self, message: StatisticsMessage) -> RfiResult<()> {
        match &self.accumulator {
            Some(accumulator) => accumulator.send(message),
            None => {
                self.statistics.apply(message);
                Ok(())
            }
        }
    }
}

impl Default for ArtifactSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArtifactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSet")
            .field("baseline", &self.baseline_index.as_ref().map(|index| index.describe()))
            .field("time_steps", &self.original.time_steps())
            .field("channels", &self.original.channels())
            .field("has_source", &self.source.is_some())
            .field("sensitivity", &self.sensitivity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Image, PhaseRepresentation, Polarization};
    use crate::statistics::BaselineSelectionRecord;

    #[test]
    fn contaminated_starts_as_a_shared_copy() {
        let data = TimeFrequencyData::new(
            PhaseRepresentation::Amplitude,
            Polarization::StokesI,
            vec![Image::filled(4, 4, 1.0)],
        )
        .unwrap();
        let artifacts = ArtifactSet::from_data(data, None);
        assert!(artifacts.original.images()[0].shares_storage(&artifacts.contaminated.images()[0]));
        assert!(artifacts.revised.is_empty());
    }

    #[test]
    fn statistics_are_kept_locally_without_accumulator() {
        let mut artifacts = ArtifactSet::new();
        artifacts
            .record_statistics(StatisticsMessage::Baseline(BaselineSelectionRecord {
                antenna1: 0,
                antenna2: 1,
                band: 0,
                length: 10.0,
                angle: 0.0,
                flagged_count: 1,
                total_count: 4,
            }))
            .unwrap();
        assert_eq!(artifacts.statistics.baselines.len(), 1);
    }
}
