use crate::imagesets::DataShape;
use crate::pipeline::{PipelineConfig, PipelineWarning};

/// Thread count and queue bounds derived from the memory budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPlan {
    pub requested_threads: usize,
    /// Thread count after the budget check; includes the reader.
    pub threads: usize,
    pub workers: usize,
    /// The reader refills the queue once it holds this many tasks or fewer.
    pub low_water: usize,
    /// The reader never queues more than this many tasks.
    pub high_water: usize,
    pub per_task_bytes: u64,
    pub per_thread_bytes: u64,
    pub warning: Option<PipelineWarning>,
}

impl MemoryPlan {
    pub fn compute(config: &PipelineConfig, shape: DataShape) -> Self {
        let requested_threads = config.requested_threads().max(1);
        let budget = config.memory_budget_bytes;
        let per_task_bytes = shape.baseline_bytes();
        let per_thread_bytes = per_task_bytes.saturating_mul(config.copy_factor);

        let mut threads = requested_threads;
        let mut warning = None;
        let worker_bytes = (requested_threads as u64 - 1).saturating_mul(per_thread_bytes);
        if per_thread_bytes > 0 && worker_bytes > budget {
            threads = ((budget / per_thread_bytes) as usize).max(1);
            warning = Some(PipelineWarning::ThreadCountReduced {
                requested: requested_threads,
                effective: threads,
                per_thread_bytes,
                budget_bytes: budget,
            });
        }
        let workers = threads.saturating_sub(1).max(1);

        let low_water = threads;
        let ceiling = (low_water * 4).max(low_water + 1);
        let high_water = if per_task_bytes == 0 {
            ceiling
        } else {
            let spare = budget.saturating_sub(workers as u64 * per_thread_bytes);
            ((spare / per_task_bytes) as usize).clamp(low_water + 1, ceiling)
        };

        Self {
            requested_threads,
            threads,
            workers,
            low_water,
            high_water,
            per_task_bytes,
            per_thread_bytes,
            warning,
        }
    }
}
