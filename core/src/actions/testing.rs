//! Shared fixtures for action and pipeline tests.

use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::imagesets::synthetic::{noise_image, FlagStore, LineInjection};
use crate::imagesets::{share, SourceHandle, SyntheticImageSet, TestSetConfig};
use crate::model::{PhaseRepresentation, Polarization, TimeFrequencyData};
use crate::prelude::{RfiError, RfiResult};
use crate::progress::ProgressListener;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Leaf that logs its lifecycle calls and optionally fails.
pub struct Tracer {
    name: String,
    events: EventLog,
    fail: bool,
}

impl Tracer {
    pub fn new(name: &str, events: &EventLog) -> Self {
        Self {
            name: name.into(),
            events: events.clone(),
            fail: false,
        }
    }

    pub fn failing(name: &str, events: &EventLog) -> Self {
        Self {
            fail: true,
            ..Self::new(name, events)
        }
    }
}

impl Action for Tracer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::SetFlagging
    }

    fn initialize(&mut self) -> RfiResult<()> {
        self.events.push(format!("init {}", self.name));
        Ok(())
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        self.events.push(format!("perform {}", self.name));
        if let Some(index) = &artifacts.baseline_index {
            self.events.push(format!("baseline {}", index.describe()));
        }
        if self.fail {
            return Err(RfiError::InvalidInput(format!("{} failed", self.name)));
        }
        Ok(())
    }

    fn finish(&mut self) -> RfiResult<()> {
        self.events.push(format!("finish {}", self.name));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingListener {
    pub started: usize,
    pub ended: usize,
    pub progress: Vec<(usize, usize)>,
    pub exceptions: Vec<String>,
}

impl ProgressListener for RecordingListener {
    fn on_start_task(&mut self, _: &dyn Action, _: usize, _: usize, _: &str, _: f64) {
        self.started += 1;
    }

    fn on_end_task(&mut self, _: &dyn Action) {
        self.ended += 1;
    }

    fn on_progress(&mut self, _: &dyn Action, progress: usize, max_progress: usize) {
        self.progress.push((progress, max_progress));
    }

    fn on_exception(&mut self, action: &dyn Action, _: &RfiError) {
        self.exceptions.push(action.name().to_string());
    }
}

/// Real-valued Stokes I noise with a constant line at `channel`.
pub fn line_data(time_steps: usize, channels: usize, channel: usize, amplitude: f32) -> TimeFrequencyData {
    let mut rng = StdRng::seed_from_u64(11);
    let mut image = noise_image(time_steps, channels, 1.0, &mut rng);
    image.make_mut().column_mut(channel).mapv_inplace(|value| value + amplitude);
    TimeFrequencyData::new(PhaseRepresentation::Real, Polarization::StokesI, vec![image])
        .unwrap()
}

pub fn synthetic_source(antennas: usize, config: TestSetConfig) -> (SourceHandle, FlagStore) {
    let set = SyntheticImageSet::new(SyntheticImageSet::linear_array(antennas, 25.0), config);
    let store = set.flag_store();
    (share(Box::new(set)), store)
}

pub fn line_config(time_steps: usize, channels: usize) -> TestSetConfig {
    TestSetConfig {
        time_steps,
        channels,
        seed: 3,
        lines: vec![LineInjection {
            channel: channels / 3,
            amplitude: 20.0,
        }],
        ..Default::default()
    }
}
