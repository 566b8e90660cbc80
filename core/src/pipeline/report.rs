use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-fatal adjustments made while planning a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineWarning {
    ThreadCountReduced {
        requested: usize,
        effective: usize,
        per_thread_bytes: u64,
        budget_bytes: u64,
    },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::ThreadCountReduced {
                requested,
                effective,
                per_thread_bytes,
                budget_bytes,
            } => write!(
                f,
                "thread count reduced from {} to {}: {} bytes per thread exceed the {} byte budget",
                requested, effective, per_thread_bytes, budget_bytes
            ),
        }
    }
}

/// Summary of one pipeline run, left in the merged artifact set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub selected: usize,
    pub processed: usize,
    pub failed: usize,
    pub workers: usize,
    pub low_water: usize,
    pub high_water: usize,
    /// Largest number of read tasks waiting for a worker at any point.
    pub peak_queued: usize,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}
