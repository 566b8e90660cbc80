//! Multi-window threshold flagging.
//!
//! Each pass estimates a robust background and noise level from the samples
//! that are not yet flagged, then slides windows of increasing length along
//! the time and frequency axes. A window holding `L` unflagged samples is
//! flagged when the mean deviation of those samples exceeds
//! `τ(L) = τ(1) · ρ^(-log2 L)` noise sigmas, so a weak but sustained excess
//! is caught as reliably as a single strong spike. Flags raised for one
//! window length are excluded from the sums of the next one, which keeps a
//! strong narrow feature from bleeding into its neighbours.

use crate::math::{MatrixHelper, StatsHelper};
use crate::model::{Image, Mask};
use crate::prelude::{RfiError, RfiResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackgroundFit {
    /// Robust mean of the unflagged samples.
    Constant,
    /// Least-squares 2D polynomial surface of total degree `order` (0-2).
    Polynomial { order: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// `τ(1)` in noise sigmas.
    pub base_sensitivity: f64,
    /// Threshold decay per doubling of the window length.
    pub length_rho: f64,
    pub window_lengths: Vec<usize>,
    pub time_direction: bool,
    pub frequency_direction: bool,
    pub iterations: usize,
    pub background: BackgroundFit,
    /// Side length of the square regions the safety valve inspects.
    pub safety_region: usize,
    pub max_region_fraction: f64,
    pub seed: u64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            base_sensitivity: 6.0,
            length_rho: 1.5,
            window_lengths: vec![1, 2, 3, 5, 10, 20, 40],
            time_direction: true,
            frequency_direction: true,
            iterations: 3,
            background: BackgroundFit::Constant,
            safety_region: 32,
            max_region_fraction: 0.5,
            seed: 0x5EED,
        }
    }
}

impl ThresholdParams {
    pub fn validate(&self) -> RfiResult<()> {
        if !(self.base_sensitivity > 0.0) {
            return Err(RfiError::Configuration(
                "threshold base sensitivity must be positive".into(),
            ));
        }
        if !(self.length_rho >= 1.0) {
            return Err(RfiError::Configuration(
                "threshold length rho must be at least 1".into(),
            ));
        }
        if self.window_lengths.is_empty() || self.window_lengths.contains(&0) {
            return Err(RfiError::Configuration(
                "window lengths must be a non-empty list of positive lengths".into(),
            ));
        }
        if self.iterations == 0 {
            return Err(RfiError::Configuration(
                "threshold flagging needs at least one iteration".into(),
            ));
        }
        if let BackgroundFit::Polynomial { order } = self.background {
            if order > 2 {
                return Err(RfiError::Configuration(format!(
                    "polynomial background order {} is above the supported maximum of 2",
                    order
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.max_region_fraction) || self.safety_region == 0 {
            return Err(RfiError::Configuration(
                "safety valve needs a region size and a fraction in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    /// `τ(L)` relative to `τ(1)`.
    pub fn length_factor(&self, length: usize) -> f64 {
        self.length_rho.powf(-(length as f64).log2())
    }
}

/// Result of one flagging call.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdOutcome {
    pub mask: Mask,
    pub iterations_run: usize,
    /// Flagged samples after each iteration; never decreasing.
    pub flagged_per_iteration: Vec<usize>,
    pub background_level: f64,
    pub sigma: f64,
    pub unflagged_by_valve: usize,
}

impl ThresholdOutcome {
    fn unchanged(mask: &Mask) -> Self {
        Self {
            mask: mask.clone(),
            iterations_run: 0,
            flagged_per_iteration: Vec::new(),
            background_level: 0.0,
            sigma: 0.0,
            unflagged_by_valve: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdFlagger {
    params: ThresholdParams,
}

impl ThresholdFlagger {
    pub fn new(params: ThresholdParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ThresholdParams {
        &self.params
    }

    /// Flags `image` starting from `mask`. Flags already present in `mask` are
    /// never removed. `sensitivity` scales `τ(1)`; values above 1 are less
    /// sensitive. The mask must have the dimensions of the image.
    pub fn flag(&self, image: &Image, mask: &Mask, sensitivity: f64) -> RfiResult<ThresholdOutcome> {
        if image.dim() != mask.dim() {
            return Err(RfiError::InvalidInput(format!(
                "mask of {:?} does not match image of {:?}",
                mask.dim(),
                image.dim()
            )));
        }
        if image.is_empty() || mask.all_flagged() {
            return Ok(ThresholdOutcome::unchanged(mask));
        }

        let samples = image.view().mapv(f64::from);
        let input_flags = mask.view().to_owned();
        let mut flags = input_flags.clone();
        let mut outcome = ThresholdOutcome::unchanged(mask);

        for _ in 0..self.params.iterations {
            let Some((residual, level, sigma)) = self.residual(&samples, &flags) else {
                break;
            };
            outcome.background_level = level;
            outcome.sigma = sigma;
            if !(sigma > 0.0) || !sigma.is_finite() {
                break;
            }

            let before = count(&flags);
            let base = self.params.base_sensitivity * sensitivity * sigma;
            self.sum_threshold(&residual, &mut flags, base);
            let after = count(&flags);
            outcome.iterations_run += 1;
            outcome.flagged_per_iteration.push(after);
            if after == before || after == flags.len() {
                break;
            }
        }

        outcome.unflagged_by_valve = self.apply_safety_valve(&mut flags, &input_flags);
        outcome.mask = Mask::from_array(flags);
        Ok(outcome)
    }

    /// Samples minus the fitted background, with the robust background level
    /// and sigma of the unflagged residuals.
    fn residual(
        &self,
        samples: &Array2<f64>,
        flags: &Array2<bool>,
    ) -> Option<(Array2<f64>, f64, f64)> {
        let mut residual = match self.params.background {
            BackgroundFit::Constant => samples.clone(),
            BackgroundFit::Polynomial { order } => match fit_polynomial(samples, flags, order) {
                Some(surface) => samples - &surface,
                None => samples.clone(),
            },
        };

        let mut unflagged: Vec<f64> = residual
            .iter()
            .zip(flags.iter())
            .filter(|(_, &flagged)| !flagged)
            .map(|(&value, _)| value)
            .collect();
        let (mean, sigma) = StatsHelper::winsorized_mean_and_std(&mut unflagged)?;
        residual.mapv_inplace(|value| value - mean);
        Some((residual, mean, sigma))
    }

    fn sum_threshold(&self, residual: &Array2<f64>, flags: &mut Array2<bool>, base: f64) {
        let (time_steps, channels) = residual.dim();
        for &length in &self.params.window_lengths {
            let threshold = base * self.params.length_factor(length);
            if self.params.time_direction && length <= time_steps {
                let mut scratch = flags.clone();
                for (values, (current, out)) in residual.axis_iter(Axis(1)).zip(
                    flags
                        .axis_iter(Axis(1))
                        .zip(scratch.axis_iter_mut(Axis(1))),
                ) {
                    threshold_line(values, current, out, length, threshold);
                }
                *flags = scratch;
            }
            if self.params.frequency_direction && length <= channels {
                let mut scratch = flags.clone();
                for (values, (current, out)) in residual.axis_iter(Axis(0)).zip(
                    flags
                        .axis_iter(Axis(0))
                        .zip(scratch.axis_iter_mut(Axis(0))),
                ) {
                    threshold_line(values, current, out, length, threshold);
                }
                *flags = scratch;
            }
        }
    }

    /// Randomly removes flags raised by this call from regions that ended up
    /// more than `max_region_fraction` flagged. Returns the number removed.
    fn apply_safety_valve(&self, flags: &mut Array2<bool>, input_flags: &Array2<bool>) -> usize {
        let (time_steps, channels) = flags.dim();
        let region = self.params.safety_region;
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut removed = 0;

        for time_start in (0..time_steps).step_by(region) {
            let time_end = (time_start + region).min(time_steps);
            for channel_start in (0..channels).step_by(region) {
                let channel_end = (channel_start + region).min(channels);
                let size = (time_end - time_start) * (channel_end - channel_start);
                let allowed = (size as f64 * self.params.max_region_fraction).floor() as usize;

                let mut flagged = 0;
                let mut candidates = Vec::new();
                for time in time_start..time_end {
                    for channel in channel_start..channel_end {
                        if flags[[time, channel]] {
                            flagged += 1;
                            if !input_flags[[time, channel]] {
                                candidates.push((time, channel));
                            }
                        }
                    }
                }
                if flagged <= allowed {
                    continue;
                }
                candidates.shuffle(&mut rng);
                let excess = (flagged - allowed).min(candidates.len());
                for &(time, channel) in &candidates[..excess] {
                    flags[[time, channel]] = false;
                }
                removed += excess;
            }
        }
        removed
    }
}

/// Flags every window of `length` unflagged samples along one line whose
/// summed deviation exceeds `threshold · length`. Reads `current`, writes
/// `out`.
fn threshold_line(
    values: ArrayView1<f64>,
    current: ArrayView1<bool>,
    mut out: ArrayViewMut1<bool>,
    length: usize,
    threshold: f64,
) {
    let n = values.len();
    let limit = threshold * length as f64;
    let mut sum = 0.0;
    let mut count = 0;
    let mut left = 0;
    for right in 0..n {
        if !current[right] {
            sum += values[right];
            count += 1;
        }
        if count == length {
            if sum.abs() > limit {
                out.slice_mut(ndarray::s![left..=right]).fill(true);
            }
            while current[left] {
                left += 1;
            }
            sum -= values[left];
            count -= 1;
            left += 1;
        }
    }
}

fn count(flags: &Array2<bool>) -> usize {
    flags.iter().filter(|&&flag| flag).count()
}

/// Least-squares polynomial surface through the unflagged samples, evaluated
/// on the whole grid. Coordinates are scaled to [-1, 1] for conditioning.
fn fit_polynomial(samples: &Array2<f64>, flags: &Array2<bool>, order: usize) -> Option<Array2<f64>> {
    let (time_steps, channels) = samples.dim();
    let terms: Vec<(i32, i32)> = (0..=order as i32)
        .flat_map(|i| (0..=order as i32 - i).map(move |j| (i, j)))
        .collect();
    let scale = |index: usize, len: usize| {
        if len <= 1 {
            0.0
        } else {
            2.0 * index as f64 / (len - 1) as f64 - 1.0
        }
    };

    let unflagged = flags.iter().filter(|&&flag| !flag).count();
    if unflagged < terms.len() {
        return None;
    }
    let mut design = Array2::<f64>::zeros((unflagged, terms.len()));
    let mut targets = Array1::<f64>::zeros(unflagged);
    let mut row = 0;
    for ((time, channel), &value) in samples.indexed_iter() {
        if flags[[time, channel]] {
            continue;
        }
        let (x, y) = (scale(time, time_steps), scale(channel, channels));
        for (column, &(i, j)) in terms.iter().enumerate() {
            design[[row, column]] = x.powi(i) * y.powi(j);
        }
        targets[row] = value;
        row += 1;
    }

    let coefficients = MatrixHelper::least_squares(design.view(), targets.view())?;
    let mut surface = Array2::<f64>::zeros((time_steps, channels));
    Zip::indexed(&mut surface).for_each(|(time, channel), out| {
        let (x, y) = (scale(time, time_steps), scale(channel, channels));
        *out = terms
            .iter()
            .zip(coefficients.iter())
            .map(|(&(i, j), c)| c * x.powi(i) * y.powi(j))
            .sum();
    });
    Some(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagesets::synthetic::noise_image;

    fn noise(time_steps: usize, channels: usize, seed: u64) -> Image {
        let mut rng = StdRng::seed_from_u64(seed);
        noise_image(time_steps, channels, 1.0, &mut rng)
    }

    fn column_fraction(mask: &Mask, channel: usize) -> f64 {
        let flagged = (0..mask.time_steps())
            .filter(|&t| mask.is_set(t, channel))
            .count();
        flagged as f64 / mask.time_steps() as f64
    }

    #[test]
    fn narrow_band_line_is_flagged_without_spreading() {
        let mut image = noise(1024, 64, 1);
        image.make_mut().column_mut(30).mapv_inplace(|v| v + 20.0);
        let mask = Mask::unset(1024, 64);

        let outcome = ThresholdFlagger::default().flag(&image, &mask, 1.0).unwrap();

        assert!(column_fraction(&outcome.mask, 30) >= 0.95);
        let other_flagged: usize = (0..64)
            .filter(|&c| c != 30)
            .map(|c| {
                (0..1024)
                    .filter(|&t| outcome.mask.is_set(t, c))
                    .count()
            })
            .sum();
        assert!((other_flagged as f64) / (1024.0 * 63.0) < 0.01);
    }

    #[test]
    fn pure_noise_has_few_false_positives() {
        let image = noise(512, 64, 2);
        let outcome = ThresholdFlagger::default()
            .flag(&image, &Mask::unset(512, 64), 1.0)
            .unwrap();
        assert!(outcome.mask.flagged_fraction() < 0.01);
        assert!((outcome.sigma - 1.0).abs() < 0.1);
    }

    #[test]
    fn broadband_burst_is_flagged_along_frequency() {
        let mut image = noise(256, 64, 3);
        image.make_mut().row_mut(100).mapv_inplace(|v| v + 15.0);
        let outcome = ThresholdFlagger::default().flag(&image, &Mask::unset(256, 64), 1.0).unwrap();
        let flagged = (0..64).filter(|&c| outcome.mask.is_set(100, c)).count();
        assert!(flagged >= 60);
    }

    #[test]
    fn rerunning_never_removes_flags() {
        let mut image = noise(256, 64, 4);
        image.make_mut().column_mut(10).mapv_inplace(|v| v + 8.0);
        let flagger = ThresholdFlagger::default();
        let first = flagger.flag(&image, &Mask::unset(256, 64), 1.0).unwrap();
        let second = flagger.flag(&image, &first.mask, 1.0).unwrap();

        for ((t, c), &flagged) in first.mask.view().indexed_iter() {
            if flagged {
                assert!(second.mask.is_set(t, c));
            }
        }
        for outcome in [&first, &second] {
            assert!(outcome
                .flagged_per_iteration
                .windows(2)
                .all(|pair| pair[0] <= pair[1]));
        }
    }

    #[test]
    fn degenerate_inputs_are_no_ops() {
        let flagger = ThresholdFlagger::default();

        let empty = flagger.flag(&Image::zeros(0, 0), &Mask::unset(0, 0), 1.0).unwrap();
        assert_eq!(empty.iterations_run, 0);

        let full = Mask::set_all(8, 8);
        let outcome = flagger.flag(&noise(8, 8, 5), &full, 1.0).unwrap();
        assert!(outcome.mask.shares_storage(&full));

        let constant = flagger
            .flag(&Image::filled(16, 16, 3.0), &Mask::unset(16, 16), 1.0)
            .unwrap();
        assert_eq!(constant.mask.count_flagged(), 0);
    }

    #[test]
    fn mask_of_another_shape_is_rejected() {
        let result = ThresholdFlagger::default().flag(&noise(16, 8, 2), &Mask::unset(8, 16), 1.0);
        assert!(matches!(result, Err(RfiError::InvalidInput(_))));
    }

    #[test]
    fn safety_valve_caps_dense_regions_but_keeps_input_flags() {
        let mut image = noise(256, 64, 6);
        image
            .make_mut()
            .slice_mut(ndarray::s![0..32, 0..32])
            .mapv_inplace(|v| v + 50.0);
        let mut mask = Mask::unset(256, 64);
        mask.set_value(0, 0, true);
        mask.set_value(5, 7, true);

        let outcome = ThresholdFlagger::default().flag(&image, &mask, 1.0).unwrap();

        let tile = outcome.mask.view().slice(ndarray::s![0..32, 0..32]).to_owned();
        let flagged = tile.iter().filter(|&&f| f).count();
        assert!(flagged <= 512);
        assert!(outcome.unflagged_by_valve > 0);
        assert!(outcome.mask.is_set(0, 0));
        assert!(outcome.mask.is_set(5, 7));
    }

    #[test]
    fn polynomial_background_removes_a_gradient() {
        let mut image = noise(128, 64, 7);
        for ((t, _), value) in image.make_mut().indexed_iter_mut() {
            *value += t as f32 * 0.2;
        }
        let params = ThresholdParams {
            background: BackgroundFit::Polynomial { order: 1 },
            ..Default::default()
        };
        let outcome = ThresholdFlagger::new(params)
            .flag(&image, &Mask::unset(128, 64), 1.0)
            .unwrap();
        assert!(outcome.mask.flagged_fraction() < 0.01);
        assert!(outcome.sigma < 1.2);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let params = ThresholdParams {
            window_lengths: vec![1, 0],
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(RfiError::Configuration(_))));
        assert!(ThresholdParams::default().validate().is_ok());
    }

    #[test]
    fn length_factor_decays_geometrically() {
        let params = ThresholdParams::default();
        assert_eq!(params.length_factor(1), 1.0);
        assert!((params.length_factor(2) - 1.0 / 1.5).abs() < 1e-12);
        assert!((params.length_factor(4) - 1.0 / 2.25).abs() < 1e-12);
    }
}
