//! Cross-baseline accumulators and the aggregator thread that owns them
//! while the pipeline runs.

pub mod aggregator;
pub mod baseline_records;
pub mod flag_statistics;

pub use aggregator::{AccumulatorHandle, StatisticsAggregator, StatisticsMessage};
pub use baseline_records::{BaselineSelectionRecord, BaselineSelectionStatistics};
pub use flag_statistics::{FlagCountReport, FlagStatistics};

/// Everything accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedStatistics {
    pub flags: FlagStatistics,
    pub baselines: BaselineSelectionStatistics,
}

impl CollectedStatistics {
    pub fn apply(&mut self, message: StatisticsMessage) {
        match message {
            StatisticsMessage::FlagCounts(report) => self.flags.add_report(&report),
            StatisticsMessage::Baseline(record) => self.baselines.add(record),
            StatisticsMessage::Collected(collected) => self.merge(*collected),
        }
    }

    pub fn merge(&mut self, other: CollectedStatistics) {
        self.flags.merge(&other.flags);
        for record in other.baselines.into_records() {
            self.baselines.add(record);
        }
    }
}
