use crate::actions::{Action, ArtifactSet};
use crate::imagesets::{BaselineIndex, SourceHandle};
use crate::pipeline::{
    lock, BaselineSelection, MemoryPlan, PipelineConfig, PipelineReport, TaskQueue,
};
use crate::prelude::{RfiError, RfiResult};
use crate::progress::{NullListener, ProgressListener};
use crate::statistics::{StatisticsAggregator, StatisticsMessage};
use crate::telemetry::{LogManager, MetricsRecorder};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread;

/// Result of a run. `failure` is the aggregate error of every baseline that
/// failed; `merged` keeps the partial results either way.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub merged: ArtifactSet,
    pub report: PipelineReport,
    pub failure: Option<RfiError>,
}

/// One run of the reader/worker engine on behalf of `owner`.
pub struct BaselinePipeline<'a> {
    owner: &'a dyn Action,
    config: &'a PipelineConfig,
    selection: BaselineSelection,
    logger: &'a LogManager,
}

impl<'a> BaselinePipeline<'a> {
    pub fn new(
        owner: &'a dyn Action,
        config: &'a PipelineConfig,
        selection: BaselineSelection,
        logger: &'a LogManager,
    ) -> Self {
        Self {
            owner,
            config,
            selection,
            logger,
        }
    }

    /// Streams every selected baseline of the artifacts' source through
    /// `process`. Each worker runs on its own copy of `artifacts` with the
    /// baseline loaded; the copy of worker 0 becomes the merged result.
    pub fn run<F>(
        &self,
        artifacts: &ArtifactSet,
        listener: &mut dyn ProgressListener,
        process: F,
    ) -> RfiResult<PipelineOutcome>
    where
        F: Fn(&mut ArtifactSet, &mut dyn ProgressListener) -> RfiResult<()> + Sync,
    {
        let source = artifacts
            .source
            .clone()
            .ok_or_else(|| RfiError::Usage("baseline pipeline started without a data source".into()))?;
        let current = artifacts.current_baseline();
        if self.selection.needs_current_baseline() && current.is_none() {
            return Err(RfiError::Usage(format!(
                "{:?} selection needs a current baseline",
                self.selection
            )));
        }

        let (shape, start, description) = {
            let source = lock(&source);
            (source.shape_hint(), source.start_index()?, source.describe())
        };
        let plan = MemoryPlan::compute(self.config, shape);
        let mut report = PipelineReport {
            selected: self.count_selected(start.box_clone(), current),
            workers: plan.workers,
            low_water: plan.low_water,
            high_water: plan.high_water,
            ..Default::default()
        };
        if let Some(warning) = &plan.warning {
            self.logger.warn(&warning.to_string());
            report.warnings.push(warning.clone());
        }
        self.logger.record(&format!(
            "processing {} baseline(s) of {} with {} worker(s), queue {}..{}",
            report.selected, description, plan.workers, plan.low_water, plan.high_water
        ));

        let (aggregator, accumulator) = StatisticsAggregator::spawn()?;
        let mut template = artifacts.clone();
        template.accumulator = Some(accumulator);
        template.pipeline_report = None;

        let queue = TaskQueue::new(plan.workers);
        let metrics = MetricsRecorder::new();
        let shared_listener = Mutex::new(listener);
        let selected = report.selected;

        let views: Vec<Option<ArtifactSet>> = thread::scope(|scope| {
            let (queue, metrics, shared_listener) = (&queue, &metrics, &shared_listener);
            let (source, plan, template, process) = (&source, &plan, &template, &process);

            let reader = scope.spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    self.read(source, start, current, plan, queue)
                }))
                .unwrap_or_else(|payload| Err(panic_error("reader", payload)));
                if let Err(err) = result {
                    self.logger.warn(&format!("reading stopped: {}", err));
                    metrics.record_failure();
                    lock(shared_listener).on_exception(self.owner, &err);
                    queue.record_failure(None, err);
                }
                queue.finish_reading();
            });

            let work = move |worker: usize| -> ArtifactSet {
                let mut view = template.clone();
                let mut quiet = NullListener;
                while let Some(task) = queue.pop() {
                    let baseline = task.index.describe();
                    view.load_task(task);
                    let result = catch_unwind(AssertUnwindSafe(|| process(&mut view, &mut quiet)))
                        .unwrap_or_else(|payload| Err(panic_error("worker", payload)));
                    match result {
                        Ok(()) => {
                            let data = &view.contaminated;
                            metrics.record_processed(data.flagged_count(), data.sample_count());
                            self.logger
                                .detail(&format!("worker {} finished {}", worker, baseline));
                        }
                        Err(err) => {
                            self.logger.warn(&format!("{} failed: {}", baseline, err));
                            metrics.record_failure();
                            lock(shared_listener).on_exception(self.owner, &err);
                            queue.record_failure(Some(baseline), err);
                        }
                    }
                    let done = queue.complete(worker);
                    lock(shared_listener).on_progress(self.owner, done, selected.max(done));
                }
                view
            };
            let workers: Vec<_> = (0..plan.workers)
                .map(|worker| scope.spawn(move || work(worker)))
                .collect();

            let views = workers
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(view) => Some(view),
                    Err(payload) => {
                        metrics.record_failure();
                        queue.record_failure(None, panic_error("worker", payload));
                        None
                    }
                })
                .collect();
            if let Err(payload) = reader.join() {
                queue.record_failure(None, panic_error("reader", payload));
            }
            views
        });
        drop(template);

        let mut merged = views
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_else(|| artifacts.clone());
        merged.accumulator = artifacts.accumulator.clone();
        let collected = aggregator.finish()?;
        match &artifacts.accumulator {
            // Nested run: the enclosing aggregator owns the totals.
            Some(outer) => outer.send(StatisticsMessage::Collected(Box::new(collected)))?,
            None => merged.statistics.merge(collected),
        }

        let snapshot = metrics.snapshot();
        report.processed = snapshot.processed;
        report.failed = snapshot.failed;
        report.peak_queued = queue.peak();
        let failure = queue.take_failure().map(|failure| failure.into_error());
        self.logger.record(&format!(
            "{} of {} baseline(s) processed, {} failed, {:.2}% of samples flagged",
            report.processed,
            report.selected,
            report.failed,
            percentage(snapshot.flagged_samples, snapshot.total_samples)
        ));

        Ok(PipelineOutcome {
            merged,
            report,
            failure,
        })
    }

    fn count_selected(
        &self,
        mut index: Box<dyn BaselineIndex>,
        current: Option<(usize, usize, usize)>,
    ) -> usize {
        let mut selected = 0;
        while index.is_valid() {
            if self.selection.matches(index.as_ref(), current) {
                selected += 1;
            }
            index.next();
        }
        selected
    }

    /// Reader stage: refills the queue in batches whenever it drains to the
    /// low-water mark. The source lock is held only around the batch I/O.
    fn read(
        &self,
        source: &SourceHandle,
        mut index: Box<dyn BaselineIndex>,
        current: Option<(usize, usize, usize)>,
        plan: &MemoryPlan,
        queue: &TaskQueue,
    ) -> RfiResult<()> {
        loop {
            let queued = queue.wait_for_room(plan.low_water);
            let room = plan.high_water.saturating_sub(queued).max(1);
            let mut batch = Vec::with_capacity(room);
            while batch.len() < room && index.is_valid() {
                if self.selection.matches(index.as_ref(), current) {
                    batch.push(index.box_clone());
                }
                index.next();
            }
            if batch.is_empty() {
                return Ok(());
            }

            let tasks = {
                let mut source = lock(source);
                for requested in &batch {
                    source.add_read_request(requested.as_ref());
                }
                source.perform_read_requests()?;
                batch
                    .iter()
                    .map(|_| source.get_next_requested())
                    .collect::<RfiResult<Vec<_>>>()?
            };
            self.logger
                .detail(&format!("queued {} baseline(s) behind {}", tasks.len(), queued));
            queue.push_batch(tasks);
        }
    }
}

fn panic_error(stage: &str, payload: Box<dyn Any + Send>) -> RfiError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into());
    RfiError::Internal(format!("{} panicked: {}", stage, message))
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
