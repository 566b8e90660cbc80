use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive pixel extent of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub time_start: usize,
    pub time_end: usize,
    pub channel_start: usize,
    pub channel_end: usize,
}

impl BoundingBox {
    pub fn point(time: usize, channel: usize) -> Self {
        Self {
            time_start: time,
            time_end: time,
            channel_start: channel,
            channel_end: channel,
        }
    }

    pub fn include(&mut self, time: usize, channel: usize) {
        self.time_start = self.time_start.min(time);
        self.time_end = self.time_end.max(time);
        self.channel_start = self.channel_start.min(channel);
        self.channel_end = self.channel_end.max(channel);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            time_start: self.time_start.min(other.time_start),
            time_end: self.time_end.max(other.time_end),
            channel_start: self.channel_start.min(other.channel_start),
            channel_end: self.channel_end.max(other.channel_end),
        }
    }

    pub fn contains(&self, time: usize, channel: usize) -> bool {
        (self.time_start..=self.time_end).contains(&time)
            && (self.channel_start..=self.channel_end).contains(&channel)
    }

    pub fn time_extent(&self) -> usize {
        self.time_end - self.time_start + 1
    }

    pub fn channel_extent(&self) -> usize {
        self.channel_end - self.channel_start + 1
    }

    /// Empty pixels between the boxes along time and frequency; zero when they
    /// touch or overlap on that axis.
    pub fn gaps_to(&self, other: &BoundingBox) -> (usize, usize) {
        (
            axis_gap(self.time_start, self.time_end, other.time_start, other.time_end),
            axis_gap(
                self.channel_start,
                self.channel_end,
                other.channel_start,
                other.channel_end,
            ),
        )
    }
}

fn axis_gap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> usize {
    if b_start > a_end {
        b_start - a_end - 1
    } else if a_start > b_end {
        a_start - b_end - 1
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentAxis {
    Time,
    Frequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentClass {
    Unclassified,
    /// Elongated along `axis`.
    Line { axis: SegmentAxis },
    /// Covers (nearly) the whole band.
    Broadband,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: u32,
    pub pixel_count: usize,
    pub bounds: BoundingBox,
    /// Mean (time, channel) position of the member pixels.
    pub centroid: (f64, f64),
    pub class: SegmentClass,
}

/// Segment id per pixel; 0 marks pixels outside every segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedImage {
    ids: Array2<u32>,
    segments: BTreeMap<u32, SegmentInfo>,
}

impl SegmentedImage {
    pub fn new(ids: Array2<u32>, segments: BTreeMap<u32, SegmentInfo>) -> Self {
        Self { ids, segments }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.ids.dim()
    }

    pub fn id_at(&self, time: usize, channel: usize) -> u32 {
        self.ids[[time, channel]]
    }

    pub fn ids(&self) -> ArrayView2<'_, u32> {
        self.ids.view()
    }

    pub fn segment(&self, id: u32) -> Option<&SegmentInfo> {
        self.segments.get(&id)
    }

    pub fn segments(&self) -> impl Iterator<Item = &SegmentInfo> {
        self.segments.values()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Array2<u32>, &mut BTreeMap<u32, SegmentInfo>) {
        (&mut self.ids, &mut self.segments)
    }

    pub fn count_by_class(&self, class: SegmentClass) -> usize {
        self.segments.values().filter(|s| s.class == class).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps_are_zero_for_touching_boxes() {
        let a = BoundingBox {
            time_start: 0,
            time_end: 4,
            channel_start: 0,
            channel_end: 1,
        };
        let b = BoundingBox {
            time_start: 5,
            time_end: 6,
            channel_start: 4,
            channel_end: 4,
        };
        assert_eq!(a.gaps_to(&b), (0, 2));
        assert_eq!(b.gaps_to(&a), (0, 2));
    }

    #[test]
    fn include_grows_the_box() {
        let mut bounds = BoundingBox::point(3, 3);
        bounds.include(1, 7);
        assert!(bounds.contains(2, 5));
        assert_eq!(bounds.time_extent(), 3);
        assert_eq!(bounds.channel_extent(), 5);
    }
}
