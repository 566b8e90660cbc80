use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::algorithms::{Morphology, MorphologyParams};
use crate::model::{SegmentAxis, SegmentClass};
use crate::prelude::RfiResult;
use crate::progress::ProgressListener;
use crate::telemetry::LogManager;
use ndarray::Zip;

/// Segments the combined contaminated mask, drops small segments from every
/// polarization and keeps the segmentation in the artifacts.
pub struct MorphologyAction {
    morphology: Morphology,
    logger: LogManager,
}

impl MorphologyAction {
    pub fn new(params: MorphologyParams) -> Self {
        Self {
            morphology: Morphology::new(params),
            logger: LogManager::new("Morphology"),
        }
    }
}

impl Action for MorphologyAction {
    fn name(&self) -> &str {
        "Morphology"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Morphology
    }

    fn initialize(&mut self) -> RfiResult<()> {
        self.morphology.params().validate()
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        let data = &mut artifacts.contaminated;
        if data.is_empty() {
            return Ok(());
        }
        let params = self.morphology.params();
        let mut mask = data.single_mask();
        let mut segmented = self.morphology.segment(&mask);

        let removed = if params.min_segment_size > 0 {
            self.morphology
                .remove_small_segments(&mut segmented, &mut mask, params.min_segment_size)
        } else {
            0
        };
        if removed > 0 {
            for polarization in 0..data.polarization_count() {
                let mut polarization_mask = data.mask(polarization).clone();
                Zip::from(polarization_mask.make_mut())
                    .and(&mask.view())
                    .for_each(|flag, &kept| *flag = *flag && kept);
                data.set_mask(polarization, polarization_mask)?;
            }
        }

        if params.cluster {
            self.morphology.cluster(&mut segmented);
        } else {
            self.morphology.classify(&mut segmented);
        }

        self.logger.detail(&format!(
            "{} segments ({} time lines, {} frequency lines, {} broadband, {} blobs), {} small removed",
            segmented.segment_count(),
            segmented.count_by_class(SegmentClass::Line {
                axis: SegmentAxis::Time
            }),
            segmented.count_by_class(SegmentClass::Line {
                axis: SegmentAxis::Frequency
            }),
            segmented.count_by_class(SegmentClass::Broadband),
            segmented.count_by_class(SegmentClass::Blob),
            removed
        ));
        artifacts.segmented = Some(segmented);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Image, Mask, PhaseRepresentation, Polarization, TimeFrequencyData};
    use crate::progress::NullListener;

    fn dipole_data() -> TimeFrequencyData {
        let images = vec![Image::zeros(16, 16), Image::zeros(16, 16)];
        let mut data =
            TimeFrequencyData::new(PhaseRepresentation::Amplitude, Polarization::AutoDipole, images)
                .unwrap();
        let mut xx = Mask::unset(16, 16);
        for time in 0..16 {
            xx.set_value(time, 5, true);
        }
        xx.set_value(0, 12, true);
        let mut yy = Mask::unset(16, 16);
        yy.set_value(9, 9, true);
        data.set_mask(0, xx).unwrap();
        data.set_mask(1, yy).unwrap();
        data
    }

    #[test]
    fn isolated_flags_are_removed_from_every_polarization() {
        let mut artifacts = ArtifactSet::from_data(dipole_data(), None);
        MorphologyAction::new(MorphologyParams::default())
            .perform(&mut artifacts, &mut NullListener)
            .unwrap();

        let data = &artifacts.contaminated;
        assert_eq!(data.mask(0).count_flagged(), 16);
        assert_eq!(data.mask(1).count_flagged(), 0);

        let segmented = artifacts.segmented.as_ref().unwrap();
        assert_eq!(segmented.segment_count(), 1);
        assert_eq!(
            segmented.count_by_class(SegmentClass::Line {
                axis: SegmentAxis::Time
            }),
            1
        );
    }

    #[test]
    fn removal_can_be_disabled() {
        let mut artifacts = ArtifactSet::from_data(dipole_data(), None);
        MorphologyAction::new(MorphologyParams {
            min_segment_size: 0,
            ..Default::default()
        })
        .perform(&mut artifacts, &mut NullListener)
        .unwrap();
        assert_eq!(artifacts.contaminated.flagged_count(), 18);
        assert_eq!(artifacts.segmented.unwrap().segment_count(), 3);
    }
}
