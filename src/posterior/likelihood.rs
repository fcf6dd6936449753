// Gaussian measurement likelihood: y ~ N(Ax, s^2 I).

use crate::linalg::{norm_sq, CsrMatrix};
use std::sync::Arc;

/// Gaussian likelihood with a fixed sparse forward operator and observed
/// data. Shared between the prior variants, so the operator and data live
/// behind `Arc`s.
#[derive(Debug, Clone)]
pub struct GaussianLikelihood {
    operator: Arc<CsrMatrix>,
    data: Arc<Vec<f64>>,
    noise_std: f64,
}

impl GaussianLikelihood {
    pub fn new(operator: Arc<CsrMatrix>, data: Arc<Vec<f64>>, noise_std: f64) -> Self {
        assert_eq!(
            operator.nrows(),
            data.len(),
            "operator rows must match data length"
        );
        Self {
            operator,
            data,
            noise_std,
        }
    }

    /// Number of unknowns (operator columns).
    pub fn dim(&self) -> usize {
        self.operator.ncols()
    }

    /// Log-density of the data given the image:
    /// `-(m/2) ln(2 pi s^2) - ||y - Ax||^2 / (2 s^2)`.
    pub fn logd(&self, x: &[f64]) -> f64 {
        let residual = self.residual(x);
        let m = self.data.len() as f64;
        let s2 = self.noise_std * self.noise_std;
        -0.5 * m * (std::f64::consts::TAU * s2).ln() - norm_sq(&residual) / (2.0 * s2)
    }

    /// Gradient of `logd` with respect to `x`: `A^T (y - Ax) / s^2`.
    pub fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let residual = self.residual(x);
        let s2 = self.noise_std * self.noise_std;
        let mut grad = self.operator.rmatvec(&residual);
        for g in &mut grad {
            *g /= s2;
        }
        grad
    }

    /// `y - Ax`.
    fn residual(&self, x: &[f64]) -> Vec<f64> {
        let projected = self.operator.matvec(x);
        self.data
            .iter()
            .zip(projected.iter())
            .map(|(y, p)| y - p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::CsrMatrix;

    fn identity_likelihood(data: Vec<f64>, noise_std: f64) -> GaussianLikelihood {
        let n = data.len();
        let triplets: Vec<(usize, usize, f64)> = (0..n).map(|i| (i, i, 1.0)).collect();
        GaussianLikelihood::new(
            Arc::new(CsrMatrix::from_triplets(n, n, &triplets)),
            Arc::new(data),
            noise_std,
        )
    }

    #[test]
    fn logd_matches_closed_form_at_data() {
        // At x = y the residual vanishes and only the normalization remains.
        let lik = identity_likelihood(vec![0.5, -0.25], 0.1);
        let expected = -1.0 * (std::f64::consts::TAU * 0.01).ln();
        assert!((lik.logd(&[0.5, -0.25]) - expected).abs() < 1e-12);
    }

    #[test]
    fn logd_penalizes_residual_quadratically() {
        let lik = identity_likelihood(vec![0.0, 0.0], 1.0);
        let at_zero = lik.logd(&[0.0, 0.0]);
        // Unit residual in one coordinate costs 1/2.
        assert!((lik.logd(&[1.0, 0.0]) - (at_zero - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn gradient_is_scaled_transposed_residual() {
        let lik = identity_likelihood(vec![1.0, 2.0], 0.5);
        // grad = (y - x) / s^2 with the identity operator.
        let grad = lik.gradient(&[0.0, 0.0]);
        assert!((grad[0] - 4.0).abs() < 1e-12);
        assert!((grad[1] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_matches_finite_differences_with_wide_operator() {
        // Non-square operator: 2 measurements of 3 unknowns.
        let operator = CsrMatrix::from_triplets(
            2,
            3,
            &[(0, 0, 1.0), (0, 2, -0.5), (1, 1, 2.0), (1, 2, 0.25)],
        );
        let lik = GaussianLikelihood::new(
            Arc::new(operator),
            Arc::new(vec![0.3, -0.7]),
            0.2,
        );

        let x = [0.1, -0.4, 0.6];
        let grad = lik.gradient(&x);
        let eps = 1e-6;
        for k in 0..x.len() {
            let mut xp = x;
            let mut xm = x;
            xp[k] += eps;
            xm[k] -= eps;
            let numerical = (lik.logd(&xp) - lik.logd(&xm)) / (2.0 * eps);
            assert!(
                (grad[k] - numerical).abs() < 1e-5,
                "coord {k}: analytic={}, numerical={}",
                grad[k],
                numerical
            );
        }
    }
}
