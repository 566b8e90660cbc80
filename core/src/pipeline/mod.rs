//! Concurrent baseline engine: one reader thread streams selected baselines
//! from the data source into a bounded queue, worker threads run a subtree on
//! each of them, and an aggregator thread collects their statistics.

pub mod engine;
pub mod memory;
pub mod queue;
pub mod report;

pub use engine::{BaselinePipeline, PipelineOutcome};
pub use memory::MemoryPlan;
pub use queue::TaskQueue;
pub use report::{PipelineReport, PipelineWarning};

use crate::imagesets::BaselineIndex;
use crate::prelude::{RfiError, RfiResult};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_MEMORY_BUDGET_BYTES: u64 = 4 << 30;
pub const DEFAULT_COPY_FACTOR: u64 = 4;

/// Resources of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Requested thread count including the reader; defaults to the number of
    /// available cores.
    pub threads: Option<usize>,
    pub memory_budget_bytes: u64,
    /// Copies of a baseline a worker holds while running its subtree.
    pub copy_factor: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET_BYTES,
            copy_factor: DEFAULT_COPY_FACTOR,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> RfiResult<()> {
        if self.threads == Some(0) {
            return Err(RfiError::Configuration("thread count must be positive".into()));
        }
        if self.memory_budget_bytes == 0 || self.copy_factor == 0 {
            return Err(RfiError::Configuration(
                "memory budget and copy factor must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn requested_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|threads| threads.get())
                .unwrap_or(1)
        })
    }
}

/// Which baselines of the source a pipeline processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineSelection {
    All,
    CrossCorrelations,
    AutoCorrelations,
    /// Auto-correlations of either antenna of the current baseline.
    CurrentAntennaAutoCorrelations,
    /// Only the current baseline.
    CurrentBaseline,
}

impl BaselineSelection {
    pub fn needs_current_baseline(self) -> bool {
        matches!(
            self,
            BaselineSelection::CurrentAntennaAutoCorrelations | BaselineSelection::CurrentBaseline
        )
    }

    /// `current` is `(antenna1, antenna2, band)` of the active baseline.
    pub fn matches(self, index: &dyn BaselineIndex, current: Option<(usize, usize, usize)>) -> bool {
        let (antenna1, antenna2) = index.antenna_pair();
        match self {
            BaselineSelection::All => true,
            BaselineSelection::CrossCorrelations => antenna1 != antenna2,
            BaselineSelection::AutoCorrelations => antenna1 == antenna2,
            BaselineSelection::CurrentAntennaAutoCorrelations => match current {
                Some((current1, current2, _)) => {
                    antenna1 == antenna2 && (antenna1 == current1 || antenna1 == current2)
                }
                None => false,
            },
            BaselineSelection::CurrentBaseline => {
                current == Some((antenna1, antenna2, index.band()))
            }
        }
    }
}

/// Locks `mutex`, recovering the data of a poisoned lock. Worker panics are
/// caught before they can leave shared state half-written.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
