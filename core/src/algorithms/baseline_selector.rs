//! Finds antenna pairs whose flagged fraction is anomalous compared with
//! physically similar baselines.

use crate::prelude::{RfiError, RfiResult};
use crate::statistics::{BaselineSelectionRecord, BaselineSelectionStatistics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LOG_RATIO_FLOOR: f64 = 1e-6;
const MIN_LENGTH: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorParams {
    /// Gaussian kernel width, in metres or in ln(metres) with `log_length`.
    pub bandwidth: f64,
    pub log_length: bool,
    pub log_ratio: bool,
    pub relative_threshold: f64,
    pub absolute_threshold: f64,
    /// Evaluate every band separately instead of summing bands per pair.
    pub per_band: bool,
    pub max_iterations: usize,
    /// Fraction of bad incident baselines above which an antenna is a bad
    /// station.
    pub station_ratio: f64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            bandwidth: 0.5,
            log_length: true,
            log_ratio: false,
            relative_threshold: 1.5,
            absolute_threshold: 0.01,
            per_band: false,
            max_iterations: 20,
            station_ratio: 0.5,
        }
    }
}

impl SelectorParams {
    pub fn validate(&self) -> RfiResult<()> {
        if !(self.bandwidth > 0.0) {
            return Err(RfiError::Configuration(
                "selector bandwidth must be positive".into(),
            ));
        }
        if self.relative_threshold < 1.0 || self.absolute_threshold < 0.0 {
            return Err(RfiError::Configuration(
                "selector thresholds must not lie below the smoothed curve".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.station_ratio) {
            return Err(RfiError::Configuration(
                "station ratio must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome for one evaluated antenna pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEvaluation {
    pub antenna1: usize,
    pub antenna2: usize,
    pub band: usize,
    pub length: f64,
    pub ratio: f64,
    /// Smoothed ratio of comparable baselines at the time it was last
    /// evaluated; `None` when no neighbour was available.
    pub expected: Option<f64>,
    pub bad: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub evaluations: Vec<BaselineEvaluation>,
    pub iterations: usize,
}

impl SelectionResult {
    pub fn bad_baselines(&self) -> impl Iterator<Item = &BaselineEvaluation> {
        self.evaluations.iter().filter(|evaluation| evaluation.bad)
    }

    pub fn bad_count(&self) -> usize {
        self.bad_baselines().count()
    }

    /// Antennas for which more than `max_ratio` of their evaluated baselines
    /// are bad, in ascending order.
    pub fn imply_stations(&self, max_ratio: f64) -> Vec<usize> {
        let mut incident: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for evaluation in &self.evaluations {
            for antenna in [evaluation.antenna1, evaluation.antenna2] {
                let (bad, total) = incident.entry(antenna).or_default();
                *total += 1;
                if evaluation.bad {
                    *bad += 1;
                }
            }
        }
        incident
            .into_iter()
            .filter(|(_, (bad, total))| *bad as f64 > max_ratio * *total as f64)
            .map(|(antenna, _)| antenna)
            .collect()
    }

    fn extend(&mut self, other: SelectionResult) {
        self.evaluations.extend(other.evaluations);
        self.iterations = self.iterations.max(other.iterations);
    }
}

#[derive(Debug, Clone, Default)]
pub struct BaselineSelector {
    params: SelectorParams,
}

impl BaselineSelector {
    pub fn new(params: SelectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SelectorParams {
        &self.params
    }

    /// Runs the selection over accumulated statistics, either per band or
    /// on the band-summed records.
    pub fn select_statistics(&self, statistics: &BaselineSelectionStatistics) -> SelectionResult {
        if !self.params.per_band {
            return self.select(&statistics.combined_bands());
        }
        let mut per_band: BTreeMap<usize, Vec<BaselineSelectionRecord>> = BTreeMap::new();
        for record in statistics.records() {
            per_band.entry(record.band).or_default().push(record.clone());
        }
        let mut result = SelectionResult::default();
        for records in per_band.values() {
            result.extend(self.select(records));
        }
        result
    }

    /// Marks baselines whose ratio exceeds the leave-one-out smoothed ratio of
    /// the remaining good baselines, repeating until nothing new is marked.
    pub fn select(&self, records: &[BaselineSelectionRecord]) -> SelectionResult {
        let candidates: Vec<&BaselineSelectionRecord> = records
            .iter()
            .filter(|record| !record.is_auto_correlation() && record.total_count > 0)
            .collect();
        let xs: Vec<f64> = candidates.iter().map(|r| self.length_coordinate(r.length)).collect();
        let ys: Vec<f64> = candidates.iter().map(|r| self.ratio_coordinate(r.ratio())).collect();

        let mut bad = vec![false; candidates.len()];
        let mut expected = vec![None; candidates.len()];
        let mut iterations = 0;
        while iterations < self.params.max_iterations {
            iterations += 1;
            let mut newly_marked = Vec::new();
            for i in 0..candidates.len() {
                if bad[i] {
                    continue;
                }
                let Some(smoothed) = self.smoothed(i, &xs, &ys, &bad) else {
                    continue;
                };
                let smoothed = self.ratio_value(smoothed);
                expected[i] = Some(smoothed);
                let limit = (self.params.relative_threshold * smoothed)
                    .max(smoothed + self.params.absolute_threshold);
                if candidates[i].ratio() > limit {
                    newly_marked.push(i);
                }
            }
            if newly_marked.is_empty() {
                break;
            }
            for i in newly_marked {
                bad[i] = true;
            }
        }

        let evaluations = candidates
            .iter()
            .enumerate()
            .map(|(i, record)| BaselineEvaluation {
                antenna1: record.antenna1,
                antenna2: record.antenna2,
                band: record.band,
                length: record.length,
                ratio: record.ratio(),
                expected: expected[i],
                bad: bad[i],
            })
            .collect();
        SelectionResult {
            evaluations,
            iterations,
        }
    }

    fn smoothed(&self, index: usize, xs: &[f64], ys: &[f64], bad: &[bool]) -> Option<f64> {
        let mut weighted = 0.0;
        let mut weights = 0.0;
        for (j, (&x, &y)) in xs.iter().zip(ys).enumerate() {
            if j == index || bad[j] {
                continue;
            }
            let distance = (x - xs[index]) / self.params.bandwidth;
            let weight = (-0.5 * distance * distance).exp();
            weighted += weight * y;
            weights += weight;
        }
        (weights > 1e-12).then(|| weighted / weights)
    }

    fn length_coordinate(&self, length: f64) -> f64 {
        if self.params.log_length {
            length.max(MIN_LENGTH).ln()
        } else {
            length
        }
    }

    fn ratio_coordinate(&self, ratio: f64) -> f64 {
        if self.params.log_ratio {
            (ratio + LOG_RATIO_FLOOR).ln()
        } else {
            ratio
        }
    }

    fn ratio_value(&self, coordinate: f64) -> f64 {
        if self.params.log_ratio {
            (coordinate.exp() - LOG_RATIO_FLOOR).max(0.0)
        } else {
            coordinate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVE: f64 = 0.05;

    fn records(antennas: usize, ratio_of: impl Fn(usize, usize) -> f64) -> Vec<BaselineSelectionRecord> {
        let mut records = Vec::new();
        for a1 in 0..antennas {
            for a2 in a1..antennas {
                let ratio = ratio_of(a1, a2);
                records.push(BaselineSelectionRecord {
                    antenna1: a1,
                    antenna2: a2,
                    band: 0,
                    length: 10.0 * (a2 - a1) as f64 + 0.5 * a1 as f64,
                    angle: 0.0,
                    flagged_count: (ratio * 10_000.0).round() as usize,
                    total_count: 10_000,
                });
            }
        }
        records
    }

    #[test]
    fn ratios_on_the_curve_mark_nothing() {
        let result = BaselineSelector::default().select(&records(8, |_, _| CURVE));
        assert_eq!(result.evaluations.len(), 28);
        assert_eq!(result.bad_count(), 0);
        assert!(result.imply_stations(0.5).is_empty());
    }

    #[test]
    fn one_injected_outlier_is_marked_alone() {
        let params = SelectorParams::default();
        let outlier = CURVE + 10.0 * params.absolute_threshold;
        let result = BaselineSelector::new(params)
            .select(&records(8, |a1, a2| if (a1, a2) == (2, 5) { outlier } else { CURVE }));

        let bad: Vec<(usize, usize)> = result
            .bad_baselines()
            .map(|evaluation| (evaluation.antenna1, evaluation.antenna2))
            .collect();
        assert_eq!(bad, vec![(2, 5)]);
        let marked = result.bad_baselines().next().unwrap();
        assert!((marked.expected.unwrap() - CURVE).abs() < 1e-9);
    }

    #[test]
    fn imply_stations_marks_antenna_with_mostly_bad_baselines() {
        let result = BaselineSelector::default().select(&records(8, |a1, a2| {
            if a1 == 3 || a2 == 3 {
                0.5
            } else {
                CURVE
            }
        }));
        assert_eq!(result.bad_count(), 7);
        assert_eq!(result.imply_stations(0.5), vec![3]);
    }

    #[test]
    fn autos_and_empty_records_are_ignored() {
        let mut input = records(3, |_, _| CURVE);
        input.push(BaselineSelectionRecord {
            antenna1: 7,
            antenna2: 8,
            band: 0,
            length: 5.0,
            angle: 0.0,
            flagged_count: 0,
            total_count: 0,
        });
        let result = BaselineSelector::default().select(&input);
        assert_eq!(result.evaluations.len(), 3);
        assert!(result.evaluations.iter().all(|e| e.antenna1 != e.antenna2));
    }

    #[test]
    fn per_band_selection_evaluates_each_band() {
        let mut statistics = BaselineSelectionStatistics::default();
        for band in 0..2 {
            for record in records(4, |_, _| CURVE) {
                statistics.add(BaselineSelectionRecord { band, ..record });
            }
        }
        let combined = BaselineSelector::default().select_statistics(&statistics);
        assert_eq!(combined.evaluations.len(), 6);

        let per_band = BaselineSelector::new(SelectorParams {
            per_band: true,
            ..Default::default()
        })
        .select_statistics(&statistics);
        assert_eq!(per_band.evaluations.len(), 12);
    }

    #[test]
    fn invalid_bandwidth_is_rejected() {
        let params = SelectorParams {
            bandwidth: 0.0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(RfiError::Configuration(_))));
    }
}
