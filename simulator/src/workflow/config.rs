use crate::generator::profile::ScenarioConfig;
use anyhow::Context;
use rficore::pipeline::BaselineSelection;
use rficore::strategy::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub scenario: ScenarioConfig,
    pub strategy: StrategyConfig,
}

/// Command-line values that take precedence over the loaded workflow.
#[derive(Clone, Debug, Default)]
pub struct WorkflowOverrides {
    pub antennas: Option<usize>,
    pub time_steps: Option<usize>,
    pub channels: Option<usize>,
    pub threads: Option<usize>,
    pub memory_budget_mb: Option<u64>,
    pub selection: Option<BaselineSelection>,
    pub seed: Option<u64>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &WorkflowOverrides) {
        let scenario = &mut self.scenario;
        if let Some(antennas) = overrides.antennas {
            scenario.antennas = antennas;
        }
        if let Some(time_steps) = overrides.time_steps {
            scenario.time_steps = time_steps;
        }
        if let Some(channels) = overrides.channels {
            scenario.channels = channels;
        }
        if let Some(seed) = overrides.seed {
            scenario.seed = seed;
        }

        let strategy = &mut self.strategy;
        if let Some(threads) = overrides.threads {
            strategy.pipeline.threads = Some(threads);
        }
        if let Some(megabytes) = overrides.memory_budget_mb {
            strategy.pipeline.memory_budget_bytes = megabytes.saturating_mul(1 << 20);
        }
        if let Some(selection) = overrides.selection {
            strategy.selection = selection;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn overrides_replace_loaded_values() {
        let mut cfg = WorkflowConfig::default();
        cfg.apply(&WorkflowOverrides {
            antennas: Some(12),
            threads: Some(3),
            memory_budget_mb: Some(64),
            selection: Some(BaselineSelection::All),
            ..Default::default()
        });
        assert_eq!(cfg.scenario.antennas, 12);
        assert_eq!(cfg.scenario.time_steps, ScenarioConfig::default().time_steps);
        assert_eq!(cfg.strategy.pipeline.threads, Some(3));
        assert_eq!(cfg.strategy.pipeline.memory_budget_bytes, 64 << 20);
        assert_eq!(cfg.strategy.selection, BaselineSelection::All);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"scenario:\n  antennas: 6\n  channels: 32\n  noisy_antenna: null\nstrategy:\n  iterations: 3\n  selection: All\n  threshold:\n    base_sensitivity: 5.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.scenario.antennas, 6);
        assert_eq!(cfg.scenario.channels, 32);
        assert_eq!(cfg.scenario.noisy_antenna, None);
        assert_eq!(cfg.strategy.iterations, 3);
        assert_eq!(cfg.strategy.selection, BaselineSelection::All);
        assert_eq!(cfg.strategy.threshold.base_sensitivity, 5.0);
        assert_eq!(cfg.strategy.threshold.length_rho, 1.5);
    }

    #[test]
    fn config_load_reports_the_path() {
        let err = WorkflowConfig::load("/nonexistent/workflow.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/workflow.yaml"));
    }
}
