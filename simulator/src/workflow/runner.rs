use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use rficore::imagesets::{share, ImageSet};
use rficore::prelude::RfiError;
use rficore::{run_strategy, ArtifactSet, LoggingListener, PipelineReport, Strategy};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadBaseline {
    pub antenna1: usize,
    pub antenna2: usize,
    pub band: usize,
    pub ratio: f64,
    pub expected: Option<f64>,
}

/// Outcome of one workflow run, written out as the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub source: String,
    pub baselines_reported: usize,
    pub flagged_fraction: f64,
    pub channel_occupancy: Vec<f64>,
    pub bad_baselines: Vec<BadBaseline>,
    pub bad_stations: Vec<usize>,
    pub pipeline: Option<PipelineReport>,
    /// Aggregate error of a run whose baselines did not all succeed.
    pub failure: Option<String>,
}

impl WorkflowResult {
    pub fn write_report<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing run report")?;
        fs::write(path_ref, json)
            .with_context(|| format!("writing run report {}", path_ref.display()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let image_set = self
            .config
            .scenario
            .build_image_set()
            .context("building synthetic observation")?;
        let source = image_set.describe();
        let mut root = Strategy::build(&self.config.strategy).context("building strategy")?;

        let mut artifacts = ArtifactSet::with_source(share(Box::new(image_set)));
        let mut listener = LoggingListener::default();
        let failure = match run_strategy(&mut root, &mut artifacts, &mut listener) {
            Ok(()) => None,
            // Per-baseline failures leave partial results worth reporting.
            Err(err @ RfiError::Concurrency { .. }) => {
                log::warn!("run finished with failures: {}", err);
                Some(err.to_string())
            }
            Err(err) => return Err(err).context("running strategy"),
        };

        let flags = &artifacts.statistics.flags;
        let station_ratio = self.config.strategy.selector.station_ratio;
        let (bad_baselines, bad_stations) = match &artifacts.selection {
            Some(selection) => (
                selection
                    .bad_baselines()
                    .map(|bad| BadBaseline {
                        antenna1: bad.antenna1,
                        antenna2: bad.antenna2,
                        band: bad.band,
                        ratio: bad.ratio,
                        expected: bad.expected,
                    })
                    .collect(),
                selection.imply_stations(station_ratio),
            ),
            None => (Vec::new(), Vec::new()),
        };

        Ok(WorkflowResult {
            source,
            baselines_reported: flags.baselines_reported,
            flagged_fraction: flags.flagged_fraction(),
            channel_occupancy: flags.per_channel.iter().map(|channel| channel.fraction()).collect(),
            bad_baselines,
            bad_stations,
            pipeline: artifacts.pipeline_report.clone(),
            failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::ScenarioConfig;
    use tempfile::tempdir;

    fn small_workflow() -> WorkflowConfig {
        let mut config = WorkflowConfig {
            scenario: ScenarioConfig {
                antennas: 5,
                time_steps: 64,
                channels: 32,
                seed: 9,
                ..Default::default()
            },
            ..Default::default()
        };
        config.strategy.pipeline.threads = Some(3);
        config.strategy.write_flags = false;
        config
    }

    #[test]
    fn runner_executes_workflow() {
        let result = Runner::new(small_workflow()).execute().unwrap();
        assert_eq!(result.baselines_reported, 10);
        assert_eq!(result.channel_occupancy.len(), 32);
        assert!(result.flagged_fraction > 0.0 && result.flagged_fraction < 1.0);
        let pipeline = result.pipeline.unwrap();
        assert_eq!((pipeline.selected, pipeline.processed), (10, 10));
        assert!(pipeline.peak_queued <= pipeline.high_water);
        assert!(result.failure.is_none());
    }

    #[test]
    fn invalid_scenario_is_reported_with_context() {
        let mut config = small_workflow();
        config.scenario.antennas = 1;
        let err = Runner::new(config).execute().unwrap_err();
        assert!(format!("{:#}", err).contains("building synthetic observation"));
    }

    #[test]
    fn report_is_written_as_json() {
        let result = Runner::new(small_workflow()).execute().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        result.write_report(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["baselines_reported"], 10);
        assert_eq!(written["pipeline"]["processed"], 10);
    }
}
