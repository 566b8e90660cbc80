use std::sync::Mutex;

/// Baseline counters shared by the pipeline's worker threads.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub processed: usize,
    pub failed: usize,
    pub flagged_samples: usize,
    pub total_samples: usize,
}

#[derive(Default)]
struct Metrics {
    processed: usize,
    failed: usize,
    flagged_samples: usize,
    total_samples: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_processed(&self, flagged_samples: usize, total_samples: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
            metrics.flagged_samples += flagged_samples;
            metrics.total_samples += total_samples;
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failed += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                processed: metrics.processed,
                failed: metrics.failed,
                flagged_samples: metrics.flagged_samples,
                total_samples: metrics.total_samples,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
