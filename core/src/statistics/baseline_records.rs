use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flag totals of one antenna pair in one band, summed over every time the
/// pair was processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSelectionRecord {
    pub antenna1: usize,
    pub antenna2: usize,
    pub band: usize,
    /// Physical baseline length \[metres\].
    pub length: f64,
    /// Baseline orientation \[radians\].
    pub angle: f64,
    pub flagged_count: usize,
    pub total_count: usize,
}

impl BaselineSelectionRecord {
    pub fn ratio(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.flagged_count as f64 / self.total_count as f64
        }
    }

    pub fn is_auto_correlation(&self) -> bool {
        self.antenna1 == self.antenna2
    }
}

/// Records keyed by (antenna1, antenna2, band).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineSelectionStatistics {
    records: BTreeMap<(usize, usize, usize), BaselineSelectionRecord>,
}

impl BaselineSelectionStatistics {
    pub fn add(&mut self, record: BaselineSelectionRecord) {
        let key = (record.antenna1, record.antenna2, record.band);
        match self.records.get_mut(&key) {
            Some(existing) => {
                existing.flagged_count += record.flagged_count;
                existing.total_count += record.total_count;
            }
            None => {
                self.records.insert(key, record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &BaselineSelectionRecord> {
        self.records.values()
    }

    pub fn into_records(self) -> impl Iterator<Item = BaselineSelectionRecord> {
        self.records.into_values()
    }

    /// One record per antenna pair with all bands summed.
    pub fn combined_bands(&self) -> Vec<BaselineSelectionRecord> {
        let mut combined: BTreeMap<(usize, usize), BaselineSelectionRecord> = BTreeMap::new();
        for record in self.records.values() {
            combined
                .entry((record.antenna1, record.antenna2))
                .and_modify(|existing| {
                    existing.flagged_count += record.flagged_count;
                    existing.total_count += record.total_count;
                })
                .or_insert_with(|| BaselineSelectionRecord {
                    band: 0,
                    ..record.clone()
                });
        }
        combined.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(band: usize, flagged: usize) -> BaselineSelectionRecord {
        BaselineSelectionRecord {
            antenna1: 0,
            antenna2: 1,
            band,
            length: 100.0,
            angle: 0.0,
            flagged_count: flagged,
            total_count: 100,
        }
    }

    #[test]
    fn repeated_pairs_are_summed() {
        let mut stats = BaselineSelectionStatistics::default();
        stats.add(record(0, 10));
        stats.add(record(0, 30));
        stats.add(record(1, 5));
        assert_eq!(stats.len(), 2);

        let combined = stats.combined_bands();
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].flagged_count, 45);
        assert_eq!(combined[0].total_count, 300);
        assert!((combined[0].ratio() - 0.15).abs() < 1e-12);
    }
}
