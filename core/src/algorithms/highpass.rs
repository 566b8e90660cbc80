//! Masked Gaussian smoothing, used to subtract the smooth astronomical
//! background before thresholding.

use crate::math::{gaussian_kernel, FftConvolver};
use crate::model::{Image, Mask};
use crate::prelude::{RfiError, RfiResult};
use ndarray::{Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighPassParams {
    /// Kernel sigma along time \[samples\].
    pub time_sigma: f64,
    /// Kernel sigma along frequency \[channels\].
    pub frequency_sigma: f64,
}

impl Default for HighPassParams {
    fn default() -> Self {
        Self {
            time_sigma: 7.5,
            frequency_sigma: 15.0,
        }
    }
}

impl HighPassParams {
    pub fn validate(&self) -> RfiResult<()> {
        if self.time_sigma < 0.0 || self.frequency_sigma < 0.0 {
            return Err(RfiError::Configuration(
                "high-pass kernel sigmas cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HighPassFilter {
    params: HighPassParams,
}

impl HighPassFilter {
    pub fn new(params: HighPassParams) -> Self {
        Self { params }
    }

    /// Gaussian-weighted average of the unflagged neighbours of every sample.
    /// Samples with no unflagged neighbour within the kernel become zero.
    pub fn low_pass(&self, image: &Image, mask: &Mask) -> Image {
        if image.is_empty() {
            return image.clone();
        }
        let weights = mask.view().mapv(|flagged| if flagged { 0.0 } else { 1.0 });
        let mut weighted = image.view().mapv(f64::from);
        weighted *= &weights;

        let weighted = self.smooth(weighted);
        let weights = self.smooth(weights);

        let mut smoothed = Array2::<f32>::zeros(image.dim());
        Zip::from(&mut smoothed)
            .and(&weighted)
            .and(&weights)
            .for_each(|out, &value, &weight| {
                *out = if weight > 1e-9 { (value / weight) as f32 } else { 0.0 };
            });
        Image::from_array(smoothed)
    }

    /// `(image - low_pass, low_pass)`.
    pub fn high_pass(&self, image: &Image, mask: &Mask) -> (Image, Image) {
        let background = self.low_pass(image, mask);
        (image.subtract(&background), background)
    }

    fn smooth(&self, mut plane: Array2<f64>) -> Array2<f64> {
        let (time_steps, channels) = plane.dim();
        if self.params.time_sigma > 0.0 {
            let mut convolver =
                FftConvolver::new(time_steps, &gaussian_kernel(self.params.time_sigma));
            for mut column in plane.axis_iter_mut(Axis(1)) {
                let smoothed = convolver.convolve(&column.to_vec());
                column.assign(&ndarray::ArrayView1::from(&smoothed));
            }
        }
        if self.params.frequency_sigma > 0.0 {
            let mut convolver =
                FftConvolver::new(channels, &gaussian_kernel(self.params.frequency_sigma));
            for mut row in plane.axis_iter_mut(Axis(0)) {
                let smoothed = convolver.convolve(&row.to_vec());
                row.assign(&ndarray::ArrayView1::from(&smoothed));
            }
        }
        plane
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_image_has_zero_residual() {
        let image = Image::filled(40, 30, 4.0);
        let (residual, background) = HighPassFilter::default().high_pass(&image, &Mask::unset(40, 30));
        assert!(residual.view().iter().all(|v| v.abs() < 1e-4));
        assert!((background.get(20, 15) - 4.0).abs() < 1e-4);
    }

    #[test]
    fn flagged_spikes_do_not_leak_into_the_background() {
        let mut image = Image::filled(32, 32, 1.0);
        image.set(16, 16, 1000.0);
        let mut mask = Mask::unset(32, 32);
        mask.set_value(16, 16, true);

        let background = HighPassFilter::default().low_pass(&image, &mask);
        assert!((background.get(16, 17) - 1.0).abs() < 1e-3);
        assert!((background.get(16, 16) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn fully_flagged_input_gives_zero_background() {
        let image = Image::filled(8, 8, 2.0);
        let background = HighPassFilter::default().low_pass(&image, &Mask::set_all(8, 8));
        assert!(background.view().iter().all(|&v| v == 0.0));
    }
}
