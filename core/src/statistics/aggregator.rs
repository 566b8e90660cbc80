use crate::prelude::{RfiError, RfiResult};
use crate::statistics::{BaselineSelectionRecord, CollectedStatistics, FlagCountReport};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

/// Immutable per-baseline result sent by a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsMessage {
    FlagCounts(FlagCountReport),
    Baseline(BaselineSelectionRecord),
    /// Totals of a finished nested run.
    Collected(Box<CollectedStatistics>),
}

/// Sending side held by every worker's artifact set.
#[derive(Debug, Clone)]
pub struct AccumulatorHandle {
    sender: UnboundedSender<StatisticsMessage>,
}

impl AccumulatorHandle {
    pub fn send(&self, message: StatisticsMessage) -> RfiResult<()> {
        self.sender
            .send(message)
            .map_err(|_| RfiError::Internal("statistics aggregator has shut down".into()))
    }
}

/// Dedicated thread that owns the run's statistics. Workers never touch the
/// accumulators directly; they send messages through an [`AccumulatorHandle`].
pub struct StatisticsAggregator {
    thread: JoinHandle<CollectedStatistics>,
}

impl StatisticsAggregator {
    pub fn spawn() -> RfiResult<(Self, AccumulatorHandle)> {
        let (sender, mut receiver) = unbounded_channel::<StatisticsMessage>();
        let thread = thread::Builder::new()
            .name("rfi-statistics".into())
            .spawn(move || {
                let mut statistics = CollectedStatistics::default();
                while let Some(message) = receiver.blocking_recv() {
                    statistics.apply(message);
                }
                statistics
            })
            .map_err(|err| RfiError::Internal(format!("spawning statistics thread: {}", err)))?;
        Ok((Self { thread }, AccumulatorHandle { sender }))
    }

    /// Waits for every handle to be dropped, then returns the totals.
    pub fn finish(self) -> RfiResult<CollectedStatistics> {
        self.thread
            .join()
            .map_err(|_| RfiError::Internal("statistics thread panicked".into()))
    }
}
