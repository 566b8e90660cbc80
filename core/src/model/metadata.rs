use serde::{Deserialize, Serialize};

/// One antenna (or dish) of the array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaInfo {
    pub id: usize,
    pub name: String,
    /// Earth-centred position \[metres\].
    pub position: [f64; 3],
}

impl AntennaInfo {
    pub fn new(id: usize, name: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            id,
            name: name.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel centre \[Hz\].
    pub frequency_hz: f64,
    pub width_hz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandInfo {
    pub index: usize,
    pub channels: Vec<ChannelInfo>,
}

impl BandInfo {
    /// Evenly spaced channels starting at `start_hz`.
    pub fn uniform(index: usize, start_hz: f64, width_hz: f64, count: usize) -> Self {
        let channels = (0..count)
            .map(|channel| ChannelInfo {
                frequency_hz: start_hz + width_hz * channel as f64,
                width_hz,
            })
            .collect();
        Self { index, channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub id: usize,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uvw {
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

/// Read-only description of one baseline, shared between the task that read
/// it and every artifact set derived from that task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineMetaData {
    pub antenna1: AntennaInfo,
    pub antenna2: AntennaInfo,
    pub band: BandInfo,
    pub field: FieldInfo,
    pub observation_times: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvw: Option<Vec<Uvw>>,
}

impl BaselineMetaData {
    pub fn antenna_pair(&self) -> (usize, usize) {
        (self.antenna1.id, self.antenna2.id)
    }

    pub fn is_auto_correlation(&self) -> bool {
        self.antenna1.id == self.antenna2.id
    }

    /// Physical separation of the two antennas \[metres\].
    pub fn baseline_length(&self) -> f64 {
        let [dx, dy, dz] = self.baseline_vector();
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Orientation of the baseline in the x/y plane \[radians\].
    pub fn baseline_angle(&self) -> f64 {
        let [dx, dy, _] = self.baseline_vector();
        dy.atan2(dx)
    }

    fn baseline_vector(&self) -> [f64; 3] {
        let a = self.antenna1.position;
        let b = self.antenna2.position;
        [b[0] - a[0], b[1] - a[1], b[2] - a[2]]
    }

    pub fn describe(&self) -> String {
        format!(
            "{} x {} (band {}, field {})",
            self.antenna1.name, self.antenna2.name, self.band.index, self.field.name
        )
    }
}
