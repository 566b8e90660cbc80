use crate::actions::{Action, ActionKind, ArtifactSet};
use crate::model::Mask;
use crate::prelude::RfiResult;
use crate::progress::ProgressListener;
use crate::telemetry::LogManager;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlaggingMode {
    /// Unflag everything in the contaminated data.
    Clear,
    FlagAll,
    /// Copy the original masks into the contaminated data.
    FromOriginal,
    /// Copy the contaminated masks back into the original data.
    ToOriginal,
    /// OR the original masks into the contaminated data.
    OrOriginal,
    Invert,
    /// Flag samples that are exactly zero in the original data.
    FlagZeros,
}

/// Mask bookkeeping between the original and contaminated data.
pub struct SetFlaggingAction {
    mode: FlaggingMode,
    logger: LogManager,
}

impl SetFlaggingAction {
    pub fn new(mode: FlaggingMode) -> Self {
        Self {
            mode,
            logger: LogManager::new("SetFlagging"),
        }
    }

    pub fn mode(&self) -> FlaggingMode {
        self.mode
    }
}

impl Action for SetFlaggingAction {
    fn name(&self) -> &str {
        "Set flagging"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::SetFlagging
    }

    fn perform(&self, artifacts: &mut ArtifactSet, _: &mut dyn ProgressListener) -> RfiResult<()> {
        let contaminated = &mut artifacts.contaminated;
        if contaminated.is_empty() {
            return Ok(());
        }
        let (time_steps, channels) = (contaminated.time_steps(), contaminated.channels());
        match self.mode {
            FlaggingMode::Clear => contaminated.set_global_mask(Mask::unset(time_steps, channels))?,
            FlaggingMode::FlagAll => {
                contaminated.set_global_mask(Mask::set_all(time_steps, channels))?
            }
            FlaggingMode::FromOriginal => {
                for (polarization, mask) in artifacts.original.masks().iter().enumerate() {
                    contaminated.set_mask(polarization, mask.clone())?;
                }
            }
            FlaggingMode::ToOriginal => {
                for (polarization, mask) in contaminated.masks().iter().enumerate() {
                    artifacts.original.set_mask(polarization, mask.clone())?;
                }
            }
            FlaggingMode::OrOriginal => {
                for (polarization, original) in artifacts.original.masks().iter().enumerate() {
                    let mut mask = contaminated.mask(polarization).clone();
                    mask.or_assign(original);
                    contaminated.set_mask(polarization, mask)?;
                }
            }
            FlaggingMode::Invert => {
                for polarization in 0..contaminated.polarization_count() {
                    let mut mask = contaminated.mask(polarization).clone();
                    mask.invert();
                    contaminated.set_mask(polarization, mask)?;
                }
            }
            FlaggingMode::FlagZeros => {
                for polarization in 0..contaminated.polarization_count() {
                    let image = artifacts.original.flagging_image(polarization);
                    let mut mask = contaminated.mask(polarization).clone();
                    let zeros = image.view().mapv(|value| value == 0.0);
                    mask.or_assign(&Mask::from_array(zeros));
                    contaminated.set_mask(polarization, mask)?;
                }
            }
        }
        self.logger.detail(&format!(
            "{:?}: {} samples flagged",
            self.mode,
            contaminated.flagged_count()
        ));
        Ok(())
    }
}
