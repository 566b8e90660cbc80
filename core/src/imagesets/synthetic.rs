//! Seeded synthetic observations: Gaussian noise with configurable injected
//! interference, served through the [`ImageSet`] interface.

use crate::imagesets::{BaselineIndex, BaselineTask, DataShape, ImageSet};
use crate::model::{
    AntennaInfo, BandInfo, BaselineMetaData, FieldInfo, Image, Mask, PhaseRepresentation,
    Polarization, TimeFrequencyData, Uvw,
};
use crate::prelude::{RfiError, RfiResult};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Constant-in-time interference at one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineInjection {
    pub channel: usize,
    /// Strength in units of the noise sigma.
    pub amplitude: f64,
}

/// Interference covering every channel for a run of time steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstInjection {
    pub time: usize,
    pub duration: usize,
    pub amplitude: f64,
}

/// Extra interference on every baseline that includes `antenna`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoisyAntenna {
    pub antenna: usize,
    pub affected_channels: usize,
    pub amplitude: f64,
}

/// Describes the generated observation. Passed explicitly to the set so
/// the choice of generator never lives in global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSetConfig {
    pub time_steps: usize,
    pub channels: usize,
    pub bands: usize,
    pub polarization: Polarization,
    pub complex: bool,
    pub include_auto_correlations: bool,
    pub noise_sigma: f64,
    pub seed: u64,
    pub lines: Vec<LineInjection>,
    pub bursts: Vec<BurstInjection>,
    pub noisy_antennas: Vec<NoisyAntenna>,
    /// Antenna pairs whose reads fail, for exercising error paths.
    pub failing_baselines: Vec<(usize, usize)>,
}

impl Default for TestSetConfig {
    fn default() -> Self {
        Self {
            time_steps: 128,
            channels: 64,
            bands: 1,
            polarization: Polarization::StokesI,
            complex: false,
            include_auto_correlations: false,
            noise_sigma: 1.0,
            seed: 0,
            lines: Vec::new(),
            bursts: Vec::new(),
            noisy_antennas: Vec::new(),
            failing_baselines: Vec::new(),
        }
    }
}

/// Image of independent Gaussian samples.
pub fn noise_image(time_steps: usize, channels: usize, sigma: f64, rng: &mut impl Rng) -> Image {
    let data = Array2::from_shape_simple_fn((time_steps, channels), || {
        let sample: f64 = StandardNormal.sample(&mut *rng);
        (sample * sigma) as f32
    });
    Image::from_array(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct BaselineEntry {
    antenna1: usize,
    antenna2: usize,
    band: usize,
}

#[derive(Debug, Clone)]
struct SyntheticIndex {
    entries: Arc<Vec<BaselineEntry>>,
    position: usize,
}

impl SyntheticIndex {
    fn entry(&self) -> Option<BaselineEntry> {
        self.entries.get(self.position).copied()
    }
}

impl BaselineIndex for SyntheticIndex {
    fn next(&mut self) {
        if self.position < self.entries.len() {
            self.position += 1;
        }
    }

    fn previous(&mut self) {
        // Stepping back from the first baseline leaves the cursor invalid.
        self.position = self.position.checked_sub(1).unwrap_or(self.entries.len());
    }

    fn large_step_next(&mut self) {
        let Some(current) = self.entry() else {
            return;
        };
        while self
            .entry()
            .is_some_and(|entry| entry.band == current.band)
        {
            self.position += 1;
        }
    }

    fn large_step_previous(&mut self) {
        let Some(current) = self.entry() else {
            return;
        };
        let Some(target_band) = current.band.checked_sub(1) else {
            self.position = self.entries.len();
            return;
        };
        self.position = self
            .entries
            .iter()
            .position(|entry| entry.band == target_band)
            .unwrap_or(self.entries.len());
    }

    fn is_valid(&self) -> bool {
        self.position < self.entries.len()
    }

    fn describe(&self) -> String {
        match self.entry() {
            Some(entry) => format!(
                "baseline {} x {}, band {}",
                entry.antenna1, entry.antenna2, entry.band
            ),
            None => "end of set".to_string(),
        }
    }

    fn box_clone(&self) -> Box<dyn BaselineIndex> {
        Box::new(self.clone())
    }

    fn antenna_pair(&self) -> (usize, usize) {
        self.entry()
            .map(|entry| (entry.antenna1, entry.antenna2))
            .unwrap_or((usize::MAX, usize::MAX))
    }

    fn band(&self) -> usize {
        self.entry().map(|entry| entry.band).unwrap_or(usize::MAX)
    }
}

/// Flags written back by the pipeline, keyed by (antenna1, antenna2, band).
pub type FlagStore = Arc<Mutex<BTreeMap<(usize, usize, usize), Vec<Mask>>>>;

/// In-memory [`ImageSet`] that generates its baselines on demand.
pub struct SyntheticImageSet {
    antennas: Vec<AntennaInfo>,
    config: TestSetConfig,
    entries: Arc<Vec<BaselineEntry>>,
    positions: HashMap<BaselineEntry, usize>,
    pending: VecDeque<usize>,
    ready: VecDeque<BaselineTask>,
    written: FlagStore,
    reads: Arc<Mutex<usize>>,
}

impl SyntheticImageSet {
    pub fn new(antennas: Vec<AntennaInfo>, config: TestSetConfig) -> Self {
        let mut entries = Vec::new();
        for band in 0..config.bands.max(1) {
            for (i, a1) in antennas.iter().enumerate() {
                for a2 in &antennas[i..] {
                    if a1.id == a2.id && !config.include_auto_correlations {
                        continue;
                    }
                    entries.push(BaselineEntry {
                        antenna1: a1.id,
                        antenna2: a2.id,
                        band,
                    });
                }
            }
        }
        let positions = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (*entry, position))
            .collect();
        Self {
            antennas,
            config,
            entries: Arc::new(entries),
            positions,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            written: Arc::new(Mutex::new(BTreeMap::new())),
            reads: Arc::new(Mutex::new(0)),
        }
    }

    /// Antennas laid out on a line, `spacing` metres apart.
    pub fn linear_array(count: usize, spacing: f64) -> Vec<AntennaInfo> {
        (0..count)
            .map(|id| AntennaInfo::new(id, format!("RT{}", id), [spacing * id as f64, 0.0, 0.0]))
            .collect()
    }

    pub fn baseline_count(&self) -> usize {
        self.entries.len()
    }

    pub fn config(&self) -> &TestSetConfig {
        &self.config
    }

    /// Handle to the flags written through [`ImageSet::write_flags`]; stays
    /// readable after the set is moved into a shared source handle.
    pub fn flag_store(&self) -> FlagStore {
        self.written.clone()
    }

    pub fn read_counter(&self) -> Arc<Mutex<usize>> {
        self.reads.clone()
    }

    fn antenna(&self, id: usize) -> RfiResult<&AntennaInfo> {
        self.antennas
            .iter()
            .find(|antenna| antenna.id == id)
            .ok_or_else(|| RfiError::Source(format!("unknown antenna {}", id)))
    }

    fn read_baseline(&self, position: usize) -> RfiResult<BaselineTask> {
        let entry = self.entries[position];
        if self
            .config
            .failing_baselines
            .contains(&(entry.antenna1, entry.antenna2))
        {
            return Err(RfiError::Source(format!(
                "read failed for baseline {} x {}",
                entry.antenna1, entry.antenna2
            )));
        }

        let config = &self.config;
        let (time_steps, channels) = (config.time_steps, config.channels);
        let mut rng = StdRng::seed_from_u64(
            config
                .seed
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add(position as u64),
        );

        let mut interference = Array2::<f32>::zeros((time_steps, channels));
        for line in config.lines.iter().filter(|line| line.channel < channels) {
            let value = (line.amplitude * config.noise_sigma) as f32;
            interference.column_mut(line.channel).fill(value);
        }
        for burst in &config.bursts {
            let value = (burst.amplitude * config.noise_sigma) as f32;
            let end = (burst.time + burst.duration).min(time_steps);
            for time in burst.time.min(end)..end {
                interference.row_mut(time).fill(value);
            }
        }
        for noisy in config.noisy_antennas.iter().filter(|noisy| {
            noisy.antenna == entry.antenna1 || noisy.antenna == entry.antenna2
        }) {
            let value = (noisy.amplitude * config.noise_sigma) as f32;
            for _ in 0..noisy.affected_channels.min(channels) {
                let channel = rng.gen_range(0..channels);
                interference.column_mut(channel).fill(value);
            }
        }
        let interference = Image::from_array(interference);

        let phase = if config.complex {
            PhaseRepresentation::Complex
        } else {
            PhaseRepresentation::Real
        };
        let mut images = Vec::new();
        for _ in 0..config.polarization.count() {
            let real = noise_image(time_steps, channels, config.noise_sigma, &mut rng);
            let mut real = real.into_array();
            real += &interference.view();
            images.push(Image::from_array(real));
            if config.complex {
                images.push(noise_image(time_steps, channels, config.noise_sigma, &mut rng));
            }
        }
        let data = TimeFrequencyData::new(phase, config.polarization, images)?;

        let antenna1 = self.antenna(entry.antenna1)?.clone();
        let antenna2 = self.antenna(entry.antenna2)?.clone();
        let separation = [
            antenna2.position[0] - antenna1.position[0],
            antenna2.position[1] - antenna1.position[1],
            antenna2.position[2] - antenna1.position[2],
        ];
        let channel_width = 195_312.5;
        let metadata = BaselineMetaData {
            antenna1,
            antenna2,
            band: BandInfo::uniform(
                entry.band,
                1.4e9 + entry.band as f64 * channel_width * channels as f64,
                channel_width,
                channels,
            ),
            field: FieldInfo {
                id: 0,
                name: "synthetic".into(),
            },
            observation_times: (0..time_steps).map(|time| time as f64).collect(),
            uvw: Some(
                (0..time_steps)
                    .map(|_| Uvw {
                        u: separation[0],
                        v: separation[1],
                        w: separation[2],
                    })
                    .collect(),
            ),
        };

        Ok(BaselineTask {
            index: Box::new(SyntheticIndex {
                entries: self.entries.clone(),
                position,
            }),
            data,
            metadata: Arc::new(metadata),
        })
    }

    fn position_of(&self, index: &dyn BaselineIndex) -> RfiResult<usize> {
        let (antenna1, antenna2) = index.antenna_pair();
        let entry = BaselineEntry {
            antenna1,
            antenna2,
            band: index.band(),
        };
        self.positions
            .get(&entry)
            .copied()
            .ok_or_else(|| RfiError::Source(format!("{} is not in this set", index.describe())))
    }
}

impl ImageSet for SyntheticImageSet {
    fn describe(&self) -> String {
        format!(
            "synthetic set: {} antennas, {} baselines, {}x{} samples",
            self.antennas.len(),
            self.entries.len(),
            self.config.time_steps,
            self.config.channels
        )
    }

    fn start_index(&self) -> RfiResult<Box<dyn BaselineIndex>> {
        Ok(Box::new(SyntheticIndex {
            entries: self.entries.clone(),
            position: 0,
        }))
    }

    fn shape_hint(&self) -> DataShape {
        DataShape {
            polarizations: self.config.polarization.count(),
            time_steps: self.config.time_steps,
            channels: self.config.channels,
            complex: self.config.complex,
        }
    }

    fn add_read_request(&mut self, index: &dyn BaselineIndex) {
        match self.position_of(index) {
            Ok(position) => self.pending.push_back(position),
            Err(err) => log::warn!("ignoring read request: {}", err),
        }
    }

    fn perform_read_requests(&mut self) -> RfiResult<()> {
        while let Some(position) = self.pending.pop_front() {
            let task = self.read_baseline(position)?;
            self.ready.push_back(task);
            *self.reads.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        }
        Ok(())
    }

    fn get_next_requested(&mut self) -> RfiResult<BaselineTask> {
        self.ready
            .pop_front()
            .ok_or_else(|| RfiError::Usage("no performed read request is waiting".into()))
    }

    fn write_flags(&mut self, index: &dyn BaselineIndex, masks: &[Mask]) -> RfiResult<()> {
        let position = self.position_of(index)?;
        let entry = self.entries[position];
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((entry.antenna1, entry.antenna2, entry.band), masks.to_vec());
        Ok(())
    }
}
