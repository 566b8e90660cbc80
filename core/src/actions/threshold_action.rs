use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::algorithms::{ThresholdFlagger, ThresholdParams};
use crate::prelude::RfiResult;
use crate::progress::ProgressListener;
use crate::telemetry::LogManager;

/// Runs the multi-window threshold detector on the contaminated data.
pub struct ThresholdAction {
    flagger: ThresholdFlagger,
    per_polarization: bool,
    logger: LogManager,
}

impl ThresholdAction {
    /// With `per_polarization` unset, the polarizations are averaged into one
    /// image and all of them share the resulting mask.
    pub fn new(params: ThresholdParams, per_polarization: bool) -> Self {
        Self {
            flagger: ThresholdFlagger::new(params),
            per_polarization,
            logger: LogManager::new("Threshold"),
        }
    }
}

impl Action for ThresholdAction {
    fn name(&self) -> &str {
        "Threshold"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Threshold
    }

    fn initialize(&mut self) -> RfiResult<()> {
        self.flagger.params().validate()
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        let sensitivity = artifacts.sensitivity;
        let data = &mut artifacts.contaminated;
        if data.is_empty() {
            return Ok(());
        }

        if self.per_polarization && data.polarization_count() > 1 {
            for polarization in 0..data.polarization_count() {
                let image = data.flagging_image(polarization);
                let outcome = self.flagger.flag(&image, data.mask(polarization), sensitivity)?;
                self.logger.detail(&format!(
                    "polarization {}: {} flagged after {} iteration(s)",
                    polarization,
                    outcome.mask.count_flagged(),
                    outcome.iterations_run
                ));
                data.set_mask(polarization, outcome.mask)?;
            }
        } else {
            let image = data.single_flagging_image();
            let outcome = self.flagger.flag(&image, &data.single_mask(), sensitivity)?;
            self.logger.detail(&format!(
                "{} flagged after {} iteration(s), sigma {:.4}, {} removed by safety valve",
                outcome.mask.count_flagged(),
                outcome.iterations_run,
                outcome.sigma,
                outcome.unflagged_by_valve
            ));
            data.set_global_mask(outcome.mask)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::line_data;
    use crate::model::{Image, Mask, PhaseRepresentation, Polarization, TimeFrequencyData};
    use crate::progress::NullListener;

    #[test]
    fn line_is_flagged_in_contaminated_data_only() {
        let mut artifacts = ArtifactSet::from_data(line_data(256, 32, 10, 20.0), None);
        let action = ThresholdAction::new(ThresholdParams::default(), false);
        action.perform(&mut artifacts, &mut NullListener).unwrap();

        let mask = artifacts.contaminated.mask(0);
        let on_line = (0..256).filter(|&t| mask.is_set(t, 10)).count();
        assert!(on_line >= 250, "only {} line samples flagged", on_line);
        assert_eq!(artifacts.original.flagged_count(), 0);
    }

    #[test]
    fn higher_sensitivity_factor_flags_less() {
        let data = line_data(256, 32, 10, 4.0);
        let action = ThresholdAction::new(ThresholdParams::default(), false);

        let mut strict = ArtifactSet::from_data(data.clone(), None);
        action.perform(&mut strict, &mut NullListener).unwrap();
        let mut relaxed = ArtifactSet::from_data(data, None);
        relaxed.sensitivity = 8.0;
        action.perform(&mut relaxed, &mut NullListener).unwrap();

        assert!(relaxed.contaminated.flagged_count() < strict.contaminated.flagged_count());
    }

    #[test]
    fn polarizations_can_be_flagged_separately() {
        let mut hot = Image::zeros(64, 16);
        for time in 0..64 {
            hot.set(time, 3, 50.0);
            for channel in 0..16 {
                let noise = ((time * 31 + channel * 17) % 13) as f32 / 13.0 - 0.5;
                hot.set(time, channel, hot.get(time, channel) + noise);
            }
        }
        let quiet = line_data(64, 16, 0, 0.0).images()[0].clone();
        let data = TimeFrequencyData::new(
            PhaseRepresentation::Amplitude,
            Polarization::AutoDipole,
            vec![hot, quiet],
        )
        .unwrap();
        let mut artifacts = ArtifactSet::from_data(data, None);
        ThresholdAction::new(ThresholdParams::default(), true)
            .perform(&mut artifacts, &mut NullListener)
            .unwrap();

        assert!(artifacts.contaminated.mask(0).is_set(10, 3));
        assert!(!artifacts.contaminated.mask(1).is_set(10, 3));
    }

    #[test]
    fn fully_flagged_data_is_left_alone() {
        let mut data = line_data(16, 8, 2, 20.0);
        data.set_global_mask(Mask::set_all(16, 8)).unwrap();
        let mut artifacts = ArtifactSet::from_data(data, None);
        ThresholdAction::new(ThresholdParams::default(), false)
            .perform(&mut artifacts, &mut NullListener)
            .unwrap();
        assert_eq!(artifacts.contaminated.flagged_count(), 128);
    }
}
