use crate::model::{Image, Mask};
use crate::prelude::{RfiError, RfiResult};
use ndarray::{Array2, Zip};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// How the samples of a [`TimeFrequencyData`] encode the visibilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseRepresentation {
    Amplitude,
    Phase,
    Real,
    Imaginary,
    /// Two images per polarization: real then imaginary.
    Complex,
}

impl PhaseRepresentation {
    pub fn images_per_polarization(self) -> usize {
        match self {
            PhaseRepresentation::Complex => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarization {
    StokesI,
    XX,
    XY,
    YX,
    YY,
    /// XX and YY.
    AutoDipole,
    /// XX, XY, YX and YY.
    Dipole,
}

impl Polarization {
    pub fn count(self) -> usize {
        match self {
            Polarization::AutoDipole => 2,
            Polarization::Dipole => 4,
            _ => 1,
        }
    }
}

/// One baseline's samples and flags for every polarization it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrequencyData {
    phase: PhaseRepresentation,
    polarization: Polarization,
    images: Vec<Image>,
    masks: Vec<Mask>,
}

impl TimeFrequencyData {
    /// Builds data with unset masks. `images` holds one image per
    /// polarization, or a real/imaginary pair per polarization for complex
    /// data.
    pub fn new(
        phase: PhaseRepresentation,
        polarization: Polarization,
        images: Vec<Image>,
    ) -> RfiResult<Self> {
        let (time_steps, channels) = images.first().map(Image::dim).unwrap_or((0, 0));
        let mask = Mask::unset(time_steps, channels);
        let masks = vec![mask; polarization.count()];
        Self::with_masks(phase, polarization, images, masks)
    }

    pub fn with_masks(
        phase: PhaseRepresentation,
        polarization: Polarization,
        images: Vec<Image>,
        masks: Vec<Mask>,
    ) -> RfiResult<Self> {
        let expected_images = polarization.count() * phase.images_per_polarization();
        if images.len() != expected_images {
            return Err(RfiError::InvalidInput(format!(
                "{:?} {:?} data needs {} images, got {}",
                phase,
                polarization,
                expected_images,
                images.len()
            )));
        }
        if masks.len() != polarization.count() {
            return Err(RfiError::InvalidInput(format!(
                "{:?} data needs {} masks, got {}",
                polarization,
                polarization.count(),
                masks.len()
            )));
        }
        let dim = images[0].dim();
        let mismatch = images.iter().any(|image| image.dim() != dim)
            || masks.iter().any(|mask| mask.dim() != dim);
        if mismatch {
            return Err(RfiError::InvalidInput(
                "images and masks must share one shape".into(),
            ));
        }
        Ok(Self {
            phase,
            polarization,
            images,
            masks,
        })
    }

    /// Placeholder for artifact slots that hold nothing yet.
    pub fn empty() -> Self {
        Self {
            phase: PhaseRepresentation::Amplitude,
            polarization: Polarization::StokesI,
            images: Vec::new(),
            masks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() || self.images[0].is_empty()
    }

    pub fn phase(&self) -> PhaseRepresentation {
        self.phase
    }

    pub fn polarization(&self) -> Polarization {
        self.polarization
    }

    pub fn polarization_count(&self) -> usize {
        if self.images.is_empty() {
            0
        } else {
            self.polarization.count()
        }
    }

    pub fn time_steps(&self) -> usize {
        self.images.first().map(Image::time_steps).unwrap_or(0)
    }

    pub fn channels(&self) -> usize {
        self.images.first().map(Image::channels).unwrap_or(0)
    }

    pub fn sample_count(&self) -> usize {
        self.time_steps() * self.channels()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn mask(&self, polarization: usize) -> &Mask {
        &self.masks[polarization]
    }

    pub fn set_mask(&mut self, polarization: usize, mask: Mask) -> RfiResult<()> {
        self.check_mask_shape(&mask)?;
        self.masks[polarization] = mask;
        Ok(())
    }

    /// Makes every polarization share `mask`.
    pub fn set_global_mask(&mut self, mask: Mask) -> RfiResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        self.check_mask_shape(&mask)?;
        for slot in self.masks.iter_mut() {
            *slot = mask.clone();
        }
        Ok(())
    }

    /// Flags that are set in any polarization.
    pub fn single_mask(&self) -> Mask {
        let mut masks = self.masks.iter();
        let Some(first) = masks.next() else {
            return Mask::unset(0, 0);
        };
        let mut combined = first.clone();
        for mask in masks {
            combined.or_assign(mask);
        }
        combined
    }

    /// Amplitude samples of one polarization.
    pub fn amplitude_image(&self, polarization: usize) -> Image {
        match self.phase {
            PhaseRepresentation::Complex => {
                let real = &self.images[polarization * 2];
                let imaginary = &self.images[polarization * 2 + 1];
                let mut amplitude = Array2::<f32>::zeros(real.dim());
                Zip::from(&mut amplitude)
                    .and(&real.view())
                    .and(&imaginary.view())
                    .for_each(|out, &re, &im| *out = Complex32::new(re, im).norm());
                Image::from_array(amplitude)
            }
            PhaseRepresentation::Amplitude => self.images[polarization].clone(),
            _ => {
                let mut amplitude = self.images[polarization].clone();
                amplitude.make_mut().mapv_inplace(f32::abs);
                amplitude
            }
        }
    }

    /// Samples the detectors run on: amplitudes for complex data, the stored
    /// values for every real-valued representation.
    pub fn flagging_image(&self, polarization: usize) -> Image {
        match self.phase {
            PhaseRepresentation::Complex => self.amplitude_image(polarization),
            _ => self.images[polarization].clone(),
        }
    }

    /// Mean flagging image over all polarizations, used when flagging
    /// polarizations jointly.
    pub fn single_flagging_image(&self) -> Image {
        let count = self.polarization_count();
        if count == 1 {
            return self.flagging_image(0);
        }
        let mut sum = Array2::<f64>::zeros((self.time_steps(), self.channels()));
        for polarization in 0..count {
            let amplitude = self.flagging_image(polarization);
            Zip::from(&mut sum)
                .and(&amplitude.view())
                .for_each(|acc, &value| *acc += f64::from(value));
        }
        let scale = 1.0 / count as f64;
        Image::from_array(sum.mapv(|acc| (acc * scale) as f32))
    }

    /// Replaces the samples of a single-image-per-polarization representation.
    pub fn replace_images(&mut self, phase: PhaseRepresentation, images: Vec<Image>) -> RfiResult<()> {
        let replaced = Self::with_masks(phase, self.polarization, images, self.masks.clone())?;
        *self = replaced;
        Ok(())
    }

    pub fn flagged_count(&self) -> usize {
        self.single_mask().count_flagged()
    }

    fn check_mask_shape(&self, mask: &Mask) -> RfiResult<()> {
        let dim = (self.time_steps(), self.channels());
        if mask.dim() != dim {
            return Err(RfiError::InvalidInput(format!(
                "mask shape {:?} does not match data shape {:?}",
                mask.dim(),
                dim
            )));
        }
        Ok(())
    }
}
