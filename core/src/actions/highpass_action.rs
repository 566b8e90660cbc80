use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::algorithms::{HighPassFilter, HighPassParams};
use crate::model::{PhaseRepresentation, TimeFrequencyData};
use crate::prelude::RfiResult;
use crate::progress::ProgressListener;
use crate::telemetry::LogManager;

/// Replaces the contaminated samples by the original samples minus their
/// masked low-pass background, which is kept as the revised data.
pub struct HighPassFilterAction {
    filter: HighPassFilter,
    params: HighPassParams,
    logger: LogManager,
}

impl HighPassFilterAction {
    pub fn new(params: HighPassParams) -> Self {
        Self {
            filter: HighPassFilter::new(params.clone()),
            params,
            logger: LogManager::new("HighPassFilter"),
        }
    }
}

impl Action for HighPassFilterAction {
    fn name(&self) -> &str {
        "High-pass filter"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::HighPassFilter
    }

    fn initialize(&mut self) -> RfiResult<()> {
        self.params.validate()
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        let original = &artifacts.original;
        if original.is_empty() || artifacts.contaminated.is_empty() {
            return Ok(());
        }
        let phase = match original.phase() {
            PhaseRepresentation::Complex => PhaseRepresentation::Amplitude,
            phase => phase,
        };

        let mut residuals = Vec::with_capacity(original.polarization_count());
        let mut backgrounds = Vec::with_capacity(original.polarization_count());
        for polarization in 0..original.polarization_count() {
            let (residual, background) = self.filter.high_pass(
                &original.flagging_image(polarization),
                artifacts.contaminated.mask(polarization),
            );
            residuals.push(residual);
            backgrounds.push(background);
        }

        let masks = artifacts.contaminated.masks().to_vec();
        artifacts.revised =
            TimeFrequencyData::with_masks(phase, original.polarization(), backgrounds, masks)?;
        artifacts.contaminated.replace_images(phase, residuals)?;
        self.logger.detail(&format!(
            "subtracted background of {} polarization(s)",
            artifacts.revised.polarization_count()
        ));
        Ok(())
    }
}
