use anyhow::{ensure, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rficore::imagesets::synthetic::{BurstInjection, LineInjection, NoisyAntenna};
use rficore::imagesets::{SyntheticImageSet, TestSetConfig};
use rficore::model::{AntennaInfo, Polarization};
use serde::{Deserialize, Serialize};

/// Describes a synthetic observation: array layout, noise and the
/// interference injected into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub antennas: usize,
    pub time_steps: usize,
    pub channels: usize,
    pub bands: usize,
    pub polarization: Polarization,
    pub complex: bool,
    /// Antennas are scattered over a square of this side, in metres.
    pub array_extent: f64,
    pub noise_sigma: f64,
    pub seed: u64,
    pub line_count: usize,
    pub line_amplitude: f64,
    pub burst_count: usize,
    pub burst_duration: usize,
    pub burst_amplitude: f64,
    /// Antenna whose baselines pick up extra interference.
    pub noisy_antenna: Option<usize>,
    pub noisy_channels: usize,
    pub noisy_amplitude: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            antennas: 8,
            time_steps: 256,
            channels: 64,
            bands: 1,
            polarization: Polarization::StokesI,
            complex: false,
            array_extent: 2_000.0,
            noise_sigma: 1.0,
            seed: 0,
            line_count: 3,
            line_amplitude: 20.0,
            burst_count: 1,
            burst_duration: 4,
            burst_amplitude: 15.0,
            noisy_antenna: Some(1),
            noisy_channels: 12,
            noisy_amplitude: 25.0,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.antennas >= 2, "a scenario needs at least two antennas");
        ensure!(
            self.time_steps > 0 && self.channels > 0 && self.bands > 0,
            "scenario dimensions must be positive"
        );
        ensure!(self.noise_sigma > 0.0, "noise sigma must be positive");
        if let Some(antenna) = self.noisy_antenna {
            ensure!(
                antenna < self.antennas,
                "noisy antenna {} is not part of a {}-antenna array",
                antenna,
                self.antennas
            );
        }
        Ok(())
    }

    /// Seeded random positions inside the array extent.
    pub fn antenna_layout(&self) -> Vec<AntennaInfo> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let half = self.array_extent / 2.0;
        (0..self.antennas)
            .map(|id| {
                let east = rng.gen_range(-half..=half);
                let north = rng.gen_range(-half..=half);
                AntennaInfo::new(id, format!("ST{:03}", id), [east, north, 0.0])
            })
            .collect()
    }

    pub fn test_set_config(&self) -> TestSetConfig {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let lines = (0..self.line_count)
            .map(|_| LineInjection {
                channel: rng.gen_range(0..self.channels),
                amplitude: self.line_amplitude,
            })
            .collect();
        let duration = self.burst_duration.clamp(1, self.time_steps);
        let bursts = (0..self.burst_count)
            .map(|_| BurstInjection {
                time: rng.gen_range(0..=self.time_steps - duration),
                duration,
                amplitude: self.burst_amplitude,
            })
            .collect();
        let noisy_antennas = self
            .noisy_antenna
            .map(|antenna| NoisyAntenna {
                antenna,
                affected_channels: self.noisy_channels,
                amplitude: self.noisy_amplitude,
            })
            .into_iter()
            .collect();

        TestSetConfig {
            time_steps: self.time_steps,
            channels: self.channels,
            bands: self.bands,
            polarization: self.polarization,
            complex: self.complex,
            include_auto_correlations: false,
            noise_sigma: self.noise_sigma,
            seed: self.seed,
            lines,
            bursts,
            noisy_antennas,
            failing_baselines: Vec::new(),
        }
    }

    pub fn build_image_set(&self) -> anyhow::Result<SyntheticImageSet> {
        self.validate().context("validating scenario")?;
        Ok(SyntheticImageSet::new(
            self.antenna_layout(),
            self.test_set_config(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_seeded_and_inside_the_extent() {
        let config = ScenarioConfig {
            seed: 42,
            ..Default::default()
        };
        let first = config.antenna_layout();
        let second = config.antenna_layout();
        assert_eq!(first.len(), 8);
        assert_eq!(first, second);
        assert!(first
            .iter()
            .all(|antenna| antenna.position[0].abs() <= 1_000.0 && antenna.position[1].abs() <= 1_000.0));
    }

    #[test]
    fn injections_fit_the_observation() {
        let config = ScenarioConfig {
            time_steps: 16,
            channels: 8,
            line_count: 5,
            burst_count: 3,
            burst_duration: 40,
            ..Default::default()
        };
        let test_set = config.test_set_config();
        assert_eq!(test_set.lines.len(), 5);
        assert!(test_set.lines.iter().all(|line| line.channel < 8));
        assert!(test_set
            .bursts
            .iter()
            .all(|burst| burst.duration == 16 && burst.time == 0));
        assert_eq!(test_set.noisy_antennas.len(), 1);
    }

    #[test]
    fn image_set_holds_every_cross_correlation() {
        let config = ScenarioConfig {
            antennas: 5,
            bands: 2,
            ..Default::default()
        };
        let set = config.build_image_set().unwrap();
        assert_eq!(set.baseline_count(), 20);
    }

    #[test]
    fn rejects_unknown_noisy_antenna() {
        let config = ScenarioConfig {
            antennas: 3,
            noisy_antenna: Some(3),
            ..Default::default()
        };
        assert!(config.build_image_set().is_err());
    }
}
