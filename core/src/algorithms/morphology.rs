//! Segmentation of flag masks into typed regions.
//!
//! Flagged pixels are grouped by 4-connected flood fill. Segments can then
//! be classified by shape, pruned by size, and clustered when their bounding
//! boxes lie close together.

use crate::model::{
    BoundingBox, Mask, SegmentAxis, SegmentClass, SegmentInfo, SegmentedImage,
};
use crate::prelude::{RfiError, RfiResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NEIGH_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyParams {
    /// Aspect ratio above which a segment counts as a line.
    pub line_ratio: f64,
    /// Fraction of the channels a broadband segment must span.
    pub broadband_fraction: f64,
    /// Segments with fewer pixels are removed; 0 disables removal.
    pub min_segment_size: usize,
    pub cluster: bool,
    pub cluster_time_gap: usize,
    pub cluster_frequency_gap: usize,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            line_ratio: 5.0,
            broadband_fraction: 0.9,
            min_segment_size: 2,
            cluster: false,
            cluster_time_gap: 2,
            cluster_frequency_gap: 2,
        }
    }
}

impl MorphologyParams {
    pub fn validate(&self) -> RfiResult<()> {
        if !(self.line_ratio >= 1.0) {
            return Err(RfiError::Configuration(
                "line ratio must be at least 1".into(),
            ));
        }
        if !(self.broadband_fraction > 0.0 && self.broadband_fraction <= 1.0) {
            return Err(RfiError::Configuration(
                "broadband fraction must lie in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Morphology {
    params: MorphologyParams,
}

impl Morphology {
    pub fn new(params: MorphologyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MorphologyParams {
        &self.params
    }

    /// Labels every 4-connected group of flagged pixels with ids 1, 2, ...
    pub fn segment(&self, mask: &Mask) -> SegmentedImage {
        let (time_steps, channels) = mask.dim();
        let flags = mask.view();
        let mut ids = Array2::<u32>::zeros((time_steps, channels));
        let mut segments = BTreeMap::new();
        let mut stack = Vec::new();
        let mut next_id = 1u32;

        for time in 0..time_steps {
            for channel in 0..channels {
                if !flags[[time, channel]] || ids[[time, channel]] != 0 {
                    continue;
                }
                let id = next_id;
                next_id += 1;
                let mut bounds = BoundingBox::point(time, channel);
                let mut pixel_count = 0usize;
                let (mut sum_t, mut sum_c) = (0.0f64, 0.0f64);

                ids[[time, channel]] = id;
                stack.push((time, channel));
                while let Some((t, c)) = stack.pop() {
                    pixel_count += 1;
                    sum_t += t as f64;
                    sum_c += c as f64;
                    bounds.include(t, c);
                    for (dt, dc) in NEIGH_OFFSETS {
                        let (Some(nt), Some(nc)) =
                            (t.checked_add_signed(dt), c.checked_add_signed(dc))
                        else {
                            continue;
                        };
                        if nt < time_steps && nc < channels && flags[[nt, nc]] && ids[[nt, nc]] == 0
                        {
                            ids[[nt, nc]] = id;
                            stack.push((nt, nc));
                        }
                    }
                }

                segments.insert(
                    id,
                    SegmentInfo {
                        id,
                        pixel_count,
                        bounds,
                        centroid: (sum_t / pixel_count as f64, sum_c / pixel_count as f64),
                        class: SegmentClass::Unclassified,
                    },
                );
            }
        }
        SegmentedImage::new(ids, segments)
    }

    /// Assigns a shape class to every segment.
    pub fn classify(&self, segmented: &mut SegmentedImage) {
        let channels = segmented.dim().1;
        let (_, segments) = segmented.parts_mut();
        for segment in segments.values_mut() {
            segment.class = self.class_of(&segment.bounds, channels);
        }
    }

    fn class_of(&self, bounds: &BoundingBox, channels: usize) -> SegmentClass {
        let time_extent = bounds.time_extent() as f64;
        let channel_extent = bounds.channel_extent() as f64;
        if channels > 1 && channel_extent >= self.params.broadband_fraction * channels as f64 {
            SegmentClass::Broadband
        } else if time_extent > self.params.line_ratio * channel_extent {
            SegmentClass::Line {
                axis: SegmentAxis::Time,
            }
        } else if channel_extent > self.params.line_ratio * time_extent {
            SegmentClass::Line {
                axis: SegmentAxis::Frequency,
            }
        } else {
            SegmentClass::Blob
        }
    }

    /// Unflags every segment with fewer than `threshold` pixels. Returns the
    /// number of segments removed.
    pub fn remove_small_segments(
        &self,
        segmented: &mut SegmentedImage,
        mask: &mut Mask,
        threshold: usize,
    ) -> usize {
        let (ids, segments) = segmented.parts_mut();
        let small: Vec<u32> = segments
            .values()
            .filter(|segment| segment.pixel_count < threshold)
            .map(|segment| segment.id)
            .collect();
        if small.is_empty() {
            return 0;
        }

        let flags = mask.make_mut();
        for &id in &small {
            let bounds = segments[&id].bounds;
            for time in bounds.time_start..=bounds.time_end {
                for channel in bounds.channel_start..=bounds.channel_end {
                    if ids[[time, channel]] == id {
                        ids[[time, channel]] = 0;
                        flags[[time, channel]] = false;
                    }
                }
            }
            segments.remove(&id);
        }
        small.len()
    }

    /// Merges segments whose bounding boxes are within the configured gaps,
    /// repeating until no more merges happen, then relabels ids compactly.
    /// Returns the number of segments left.
    pub fn cluster(&self, segmented: &mut SegmentedImage) -> usize {
        let channels = segmented.dim().1;
        let (ids, segments) = segmented.parts_mut();
        let order: Vec<u32> = segments.keys().copied().collect();
        let position: BTreeMap<u32, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut parent: Vec<usize> = (0..order.len()).collect();
        let mut bounds: Vec<BoundingBox> = order.iter().map(|id| segments[id].bounds).collect();

        loop {
            let mut merged = false;
            for a in 0..order.len() {
                if find(&mut parent, a) != a {
                    continue;
                }
                for b in a + 1..order.len() {
                    if find(&mut parent, b) != b {
                        continue;
                    }
                    let (time_gap, channel_gap) = bounds[a].gaps_to(&bounds[b]);
                    if time_gap <= self.params.cluster_time_gap
                        && channel_gap <= self.params.cluster_frequency_gap
                    {
                        parent[b] = a;
                        bounds[a] = bounds[a].union(&bounds[b]);
                        merged = true;
                    }
                }
            }
            if !merged {
                break;
            }
        }

        let mut relabel = BTreeMap::new();
        for (i, _) in order.iter().enumerate() {
            let root = find(&mut parent, i);
            let next = relabel.len() as u32 + 1;
            relabel.entry(root).or_insert(next);
        }

        let old_segments = std::mem::take(segments);
        for segment in old_segments.values() {
            let root = find(&mut parent, position[&segment.id]);
            let new_id = relabel[&root];
            let entry = segments.entry(new_id).or_insert_with(|| SegmentInfo {
                id: new_id,
                pixel_count: 0,
                bounds: segment.bounds,
                centroid: (0.0, 0.0),
                class: SegmentClass::Unclassified,
            });
            let total = (entry.pixel_count + segment.pixel_count) as f64;
            entry.centroid = (
                (entry.centroid.0 * entry.pixel_count as f64
                    + segment.centroid.0 * segment.pixel_count as f64)
                    / total,
                (entry.centroid.1 * entry.pixel_count as f64
                    + segment.centroid.1 * segment.pixel_count as f64)
                    / total,
            );
            entry.pixel_count += segment.pixel_count;
            entry.bounds = entry.bounds.union(&segment.bounds);
        }

        let mapping: BTreeMap<u32, u32> = old_segments
            .keys()
            .map(|&id| (id, relabel[&find(&mut parent, position[&id])]))
            .collect();
        ids.mapv_inplace(|id| if id == 0 { 0 } else { mapping[&id] });

        for segment in segments.values_mut() {
            segment.class = self.class_of(&segment.bounds, channels);
        }
        segments.len()
    }
}

fn find(parent: &mut [usize], node: usize) -> usize {
    let mut root = node;
    while parent[root] != root {
        root = parent[root];
    }
    let mut current = node;
    while parent[current] != root {
        let next = parent[current];
        parent[current] = root;
        current = next;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with(points: &[(usize, usize)], dim: (usize, usize)) -> Mask {
        let mut mask = Mask::unset(dim.0, dim.1);
        for &(t, c) in points {
            mask.set_value(t, c, true);
        }
        mask
    }

    fn assert_invariants(segmented: &SegmentedImage, mask: &Mask) {
        for ((t, c), &flagged) in mask.view().indexed_iter() {
            let id = segmented.id_at(t, c);
            assert_eq!(flagged, id > 0, "pixel ({}, {})", t, c);
            if id > 0 {
                assert!(segmented.segment(id).unwrap().bounds.contains(t, c));
            }
        }
    }

    #[test]
    fn flood_fill_uses_four_connectivity() {
        // Diagonal neighbours are separate segments.
        let mask = mask_with(&[(0, 0), (1, 1), (1, 2), (2, 2)], (4, 4));
        let segmented = Morphology::default().segment(&mask);
        assert_eq!(segmented.segment_count(), 2);
        assert_invariants(&segmented, &mask);

        let big = segmented.segment(segmented.id_at(1, 1)).unwrap();
        assert_eq!(big.pixel_count, 3);
        assert_eq!(big.bounds.time_extent(), 2);
        assert!((big.centroid.0 - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn classification_distinguishes_shapes() {
        let mut points: Vec<(usize, usize)> = (0..20).map(|t| (t, 3)).collect();
        points.extend((0..10).map(|c| (25, c)));
        points.extend([(30, 5), (30, 6), (31, 5), (31, 6)]);
        let mask = mask_with(&points, (40, 10));

        let morphology = Morphology::default();
        let mut segmented = morphology.segment(&mask);
        morphology.classify(&mut segmented);

        let class_at = |t, c| segmented.segment(segmented.id_at(t, c)).unwrap().class;
        assert_eq!(
            class_at(5, 3),
            SegmentClass::Line {
                axis: SegmentAxis::Time
            }
        );
        assert_eq!(class_at(25, 0), SegmentClass::Broadband);
        assert_eq!(class_at(30, 5), SegmentClass::Blob);
    }

    #[test]
    fn small_segments_are_removed_from_mask_and_labels() {
        let mut mask = mask_with(&[(0, 0), (5, 5), (5, 6), (5, 7), (9, 9), (9, 8)], (10, 10));
        let morphology = Morphology::default();
        let mut segmented = morphology.segment(&mask);

        let removed = morphology.remove_small_segments(&mut segmented, &mut mask, 3);
        assert_eq!(removed, 2);
        assert!(segmented.segments().all(|s| s.pixel_count >= 3));
        assert_eq!(mask.count_flagged(), 3);
        assert_invariants(&segmented, &mask);
    }

    #[test]
    fn nearby_segments_are_clustered() {
        let mask = mask_with(&[(0, 0), (0, 2), (0, 4), (9, 9)], (10, 10));
        let morphology = Morphology::new(MorphologyParams {
            cluster_time_gap: 0,
            cluster_frequency_gap: 1,
            ..Default::default()
        });
        let mut segmented = morphology.segment(&mask);
        assert_eq!(segmented.segment_count(), 4);

        assert_eq!(morphology.cluster(&mut segmented), 2);
        assert_eq!(segmented.id_at(0, 0), segmented.id_at(0, 4));
        assert_ne!(segmented.id_at(0, 0), segmented.id_at(9, 9));
        assert_invariants(&segmented, &mask);

        let merged = segmented.segment(segmented.id_at(0, 0)).unwrap();
        assert_eq!(merged.pixel_count, 3);
        assert_eq!(merged.bounds.channel_extent(), 5);
    }

    #[test]
    fn empty_mask_has_no_segments() {
        let segmented = Morphology::default().segment(&Mask::unset(0, 0));
        assert_eq!(segmented.segment_count(), 0);
    }
}
