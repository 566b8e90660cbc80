pub mod fft;
pub mod matrix;
pub mod stats;

pub use fft::{gaussian_kernel, FftConvolver};
pub use matrix::MatrixHelper;
pub use stats::StatsHelper;
