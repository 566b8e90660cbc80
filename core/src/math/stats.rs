pub struct StatsHelper;

impl StatsHelper {
    /// Mean and (population) standard deviation, or `None` for no samples.
    pub fn mean_and_std(samples: &[f64]) -> Option<(f64, f64)> {
        if samples.is_empty() {
            return None;
        }
        let count = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / count;
        let variance = samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;
        Some((mean, variance.sqrt()))
    }

    /// Winsorized mean and standard deviation: the lowest and highest 10% of
    /// the samples are clamped to the nearest kept value first, and the
    /// deviation is rescaled to estimate a Gaussian sigma. Sorts `samples` in
    /// place.
    pub fn winsorized_mean_and_std(samples: &mut [f64]) -> Option<(f64, f64)> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable_by(f64::total_cmp);
        let n = samples.len();
        let clip = ((n as f64) * 0.1).floor() as usize;
        let low = samples[clip];
        let high = samples[n - 1 - clip];
        for value in samples.iter_mut() {
            *value = value.clamp(low, high);
        }
        let (mean, std) = Self::mean_and_std(samples)?;
        let correction = if clip > 0 { WINSORIZED_SIGMA_CORRECTION } else { 1.0 };
        Some((mean, std * correction))
    }
}

/// Ratio between the sigma of a normal distribution and the standard
/// deviation of the same distribution winsorized at 10%/90%.
const WINSORIZED_SIGMA_CORRECTION: f64 = 1.2139;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winsorizing_ignores_a_single_outlier() {
        let mut samples: Vec<f64> = (0..100).map(|i| (i % 2) as f64).collect();
        samples[0] = 1e6;
        let (mean, _) = StatsHelper::winsorized_mean_and_std(&mut samples).unwrap();
        assert!(mean < 1.0);
    }

    #[test]
    fn empty_samples_have_no_statistics() {
        assert!(StatsHelper::mean_and_std(&[]).is_none());
        assert!(StatsHelper::winsorized_mean_and_std(&mut []).is_none());
    }
}
