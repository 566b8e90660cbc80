use crate::imagesets::BaselineTask;
use crate::pipeline::lock;
use crate::prelude::RfiError;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub count: usize,
    pub first_baseline: Option<String>,
    pub first_error: RfiError,
}

impl FailureRecord {
    pub fn into_error(self) -> RfiError {
        RfiError::Concurrency {
            failed: self.count,
            baseline: self.first_baseline,
            cause: self.first_error.to_string(),
        }
    }
}

struct QueueState {
    tasks: VecDeque<BaselineTask>,
    reader_done: bool,
    peak: usize,
    progress: Vec<usize>,
    failure: Option<FailureRecord>,
}

/// Bounded hand-off between the reader and the workers. The tasks, the
/// reader-finished flag, the progress counters and the failure record share
/// one mutex and one condition variable.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
}

impl TaskQueue {
    pub fn new(workers: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                reader_done: false,
                peak: 0,
                progress: vec![0; workers],
                failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Blocks until at most `low_water` tasks are queued; returns the queue
    /// length at that point.
    pub fn wait_for_room(&self, low_water: usize) -> usize {
        let mut state = lock(&self.state);
        while state.tasks.len() > low_water {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.tasks.len()
    }

    pub fn push_batch(&self, tasks: Vec<BaselineTask>) {
        let mut state = lock(&self.state);
        state.tasks.extend(tasks);
        state.peak = state.peak.max(state.tasks.len());
        drop(state);
        self.changed.notify_all();
    }

    pub fn finish_reading(&self) {
        lock(&self.state).reader_done = true;
        self.changed.notify_all();
    }

    /// Next task, blocking while the queue is empty and the reader is still
    /// running. `None` once both are exhausted.
    pub fn pop(&self) -> Option<BaselineTask> {
        let mut state = lock(&self.state);
        loop {
            if let Some(task) = state.tasks.pop_front() {
                drop(state);
                self.changed.notify_all();
                return Some(task);
            }
            if state.reader_done {
                return None;
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Counts one finished task for `worker`; returns the total over all
    /// workers.
    pub fn complete(&self, worker: usize) -> usize {
        let mut state = lock(&self.state);
        state.progress[worker] += 1;
        state.progress.iter().sum()
    }

    pub fn record_failure(&self, baseline: Option<String>, error: RfiError) {
        let mut state = lock(&self.state);
        let failure = state.failure.get_or_insert(FailureRecord {
            count: 0,
            first_baseline: baseline,
            first_error: error,
        });
        failure.count += 1;
    }

    pub fn progress(&self) -> Vec<usize> {
        lock(&self.state).progress.clone()
    }

    /// Largest queue length seen after a push.
    pub fn peak(&self) -> usize {
        lock(&self.state).peak
    }

    pub fn take_failure(&self) -> Option<FailureRecord> {
        lock(&self.state).failure.take()
    }
}
