use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Singular values below this fraction of the largest one count as zero.
const RANK_TOLERANCE: f64 = 1e-12;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Least-squares coefficients for `design · c ≈ targets`, solved through
    /// the SVD of the design matrix. Returns `None` when the design is rank
    /// deficient or does not match the targets.
    pub fn least_squares(design: ArrayView2<f64>, targets: ArrayView1<f64>) -> Option<Array1<f64>> {
        let (rows, columns) = design.dim();
        if rows != targets.len() || rows < columns || columns == 0 {
            return None;
        }
        let a = DMatrix::from_fn(rows, columns, |row, column| design[[row, column]]);
        let b = DVector::from_iterator(rows, targets.iter().copied());

        let svd = a.svd(true, true);
        let largest = svd.singular_values.max();
        let cutoff = largest * RANK_TOLERANCE;
        if largest <= 0.0 || svd.singular_values.min() <= cutoff {
            return None;
        }
        let solution = svd.solve(&b, cutoff).ok()?;
        Some(solution.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn least_squares_recovers_a_line() {
        let design = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let targets = array![1.0, 3.0, 5.0, 7.0];
        let coeffs = MatrixHelper::least_squares(design.view(), targets.view()).unwrap();
        assert!((coeffs[0] - 1.0).abs() < 1e-9);
        assert!((coeffs[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn least_squares_averages_noisy_targets() {
        let design = array![[1.0], [1.0], [1.0], [1.0]];
        let targets = array![1.0, 2.0, 3.0, 6.0];
        let coeffs = MatrixHelper::least_squares(design.view(), targets.view()).unwrap();
        assert!((coeffs[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rank_deficient_designs_have_no_solution() {
        let design = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let targets = array![1.0, 2.0, 3.0];
        assert!(MatrixHelper::least_squares(design.view(), targets.view()).is_none());
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let design = array![[1.0, 0.0], [1.0, 1.0]];
        let targets = array![1.0, 2.0, 3.0];
        assert!(MatrixHelper::least_squares(design.view(), targets.view()).is_none());
    }
}
