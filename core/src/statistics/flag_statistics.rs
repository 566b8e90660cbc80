use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flag counts of one processed baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagCountReport {
    pub antenna1: usize,
    pub antenna2: usize,
    pub band: usize,
    pub flagged_per_channel: Vec<usize>,
    pub flagged_per_time: Vec<usize>,
    pub time_steps: usize,
    pub channels: usize,
}

impl FlagCountReport {
    pub fn flagged(&self) -> usize {
        self.flagged_per_channel.iter().sum()
    }

    pub fn total(&self) -> usize {
        self.time_steps * self.channels
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub flagged: usize,
    pub total: usize,
}

impl Occupancy {
    pub fn add(&mut self, flagged: usize, total: usize) {
        self.flagged += flagged;
        self.total += total;
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.flagged as f64 / self.total as f64
        }
    }
}

/// Flag occupancy over all processed baselines, per channel and per
/// antenna pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagStatistics {
    pub overall: Occupancy,
    pub per_channel: Vec<Occupancy>,
    pub per_baseline: BTreeMap<(usize, usize), Occupancy>,
    pub baselines_reported: usize,
}

impl FlagStatistics {
    pub fn add_report(&mut self, report: &FlagCountReport) {
        if self.per_channel.len() < report.channels {
            self.per_channel.resize(report.channels, Occupancy::default());
        }
        for (occupancy, &flagged) in self.per_channel.iter_mut().zip(&report.flagged_per_channel) {
            occupancy.add(flagged, report.time_steps);
        }
        let flagged = report.flagged();
        self.overall.add(flagged, report.total());
        self.per_baseline
            .entry((report.antenna1, report.antenna2))
            .or_default()
            .add(flagged, report.total());
        self.baselines_reported += 1;
    }

    pub fn merge(&mut self, other: &FlagStatistics) {
        if self.per_channel.len() < other.per_channel.len() {
            self.per_channel
                .resize(other.per_channel.len(), Occupancy::default());
        }
        for (mine, theirs) in self.per_channel.iter_mut().zip(&other.per_channel) {
            mine.add(theirs.flagged, theirs.total);
        }
        self.overall.add(other.overall.flagged, other.overall.total);
        for (pair, occupancy) in &other.per_baseline {
            self.per_baseline
                .entry(*pair)
                .or_default()
                .add(occupancy.flagged, occupancy.total);
        }
        self.baselines_reported += other.baselines_reported;
    }

    pub fn flagged_fraction(&self) -> f64 {
        self.overall.fraction()
    }
}
