use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Symmetric Gaussian kernel truncated at `3 sigma`, normalised to unit sum.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let half = (3.0 * sigma).ceil() as isize;
    let mut kernel: Vec<f64> = (-half..=half)
        .map(|offset| {
            let x = offset as f64 / sigma;
            (-0.5 * x * x).exp()
        })
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|weight| *weight /= total);
    kernel
}

/// Linear convolution of fixed-length signals with one centred kernel,
/// carried out through the `rustfft` planner.
pub struct FftConvolver {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    signal_len: usize,
    kernel_spectrum: Vec<Complex64>,
    buffer: Vec<Complex64>,
}

impl FftConvolver {
    /// `kernel` must have odd length; its middle element is offset zero.
    pub fn new(signal_len: usize, kernel: &[f64]) -> Self {
        let half = kernel.len() / 2;
        let size = (signal_len + kernel.len()).next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);

        let mut kernel_spectrum = vec![Complex64::zero(); size];
        for (i, &weight) in kernel.iter().enumerate() {
            let offset = (i + size - half) % size;
            kernel_spectrum[offset] = Complex64::new(weight, 0.0);
        }
        forward.process(&mut kernel_spectrum);

        Self {
            forward,
            inverse,
            signal_len,
            kernel_spectrum,
            buffer: vec![Complex64::zero(); size],
        }
    }

    /// Same-length output; samples beyond the ends count as zero.
    pub fn convolve(&mut self, signal: &[f64]) -> Vec<f64> {
        debug_assert_eq!(signal.len(), self.signal_len);
        let size = self.buffer.len();
        self.buffer.fill(Complex64::zero());
        for (slot, &value) in self.buffer.iter_mut().zip(signal) {
            *slot = Complex64::new(value, 0.0);
        }
        self.forward.process(&mut self.buffer);
        for (value, weight) in self.buffer.iter_mut().zip(&self.kernel_spectrum) {
            *value *= *weight;
        }
        self.inverse.process(&mut self.buffer);

        let scale = 1.0 / size as f64;
        self.buffer[..self.signal_len]
            .iter()
            .map(|value| value.re * scale)
            .collect()
    }
}
