// Prior log-densities and gradients on the square pixel grid.
//
// All Markov-random-field variants share one difference structure: first
// differences along both grid directions with zero (Dirichlet) boundaries,
// giving `2 n (n+1)` terms for an n x n image. The induced graph Laplacian
// `L = D^T D` is the 5-point Dirichlet stencil, whose eigenvalues are known
// in closed form; the GMRF normalization constant is precomputed from them.

use std::f64::consts::{PI, TAU};

/// Prior variant with its precomputed, delta-independent state. `delta` is
/// passed per evaluation; its meaning is variant-specific (variance for
/// Gaussian, inverse precision for GMRF, scale for LMRF/CMRF).
#[derive(Debug, Clone)]
pub enum Prior {
    Gaussian { dim: usize },
    Gmrf { n: usize, logdet: f64 },
    Lmrf { n: usize },
    Cmrf { n: usize },
}

impl Prior {
    /// i.i.d. zero-mean Gaussian on the n x n image; `delta` is the variance.
    pub fn gaussian(n: usize) -> Self {
        Prior::Gaussian { dim: n * n }
    }

    /// Gaussian Markov random field with precision `(1/delta) L`.
    pub fn gmrf(n: usize) -> Self {
        Prior::Gmrf {
            n,
            logdet: laplacian_logdet(n),
        }
    }

    /// Laplace Markov random field; `delta` is the scale. Not differentiable.
    pub fn lmrf(n: usize) -> Self {
        Prior::Lmrf { n }
    }

    /// Cauchy Markov random field; `delta` is the scale.
    pub fn cmrf(n: usize) -> Self {
        Prior::Cmrf { n }
    }

    pub fn differentiable(&self) -> bool {
        !matches!(self, Prior::Lmrf { .. })
    }

    /// Log-density at `x` for the given sharpness `delta`.
    ///
    /// Panics if `x` has the wrong length; the serving layer validates
    /// input shapes before evaluation reaches this point.
    pub fn logpdf(&self, x: &[f64], delta: f64) -> f64 {
        match *self {
            Prior::Gaussian { dim } => {
                assert_eq!(x.len(), dim);
                let nf = dim as f64;
                -0.5 * nf * (TAU * delta).ln() - sum_sq(x) / (2.0 * delta)
            }
            Prior::Gmrf { n, logdet } => {
                assert_eq!(x.len(), n * n);
                let nf = (n * n) as f64;
                let prec = 1.0 / delta;
                let quad = quadratic_form(x, n);
                0.5 * nf * prec.ln() + 0.5 * logdet - 0.5 * nf * TAU.ln()
                    - 0.5 * prec * quad
            }
            Prior::Lmrf { n } => {
                assert_eq!(x.len(), n * n);
                let k = num_diffs(n) as f64;
                let mut abs_sum = 0.0;
                for_each_diff(x, n, |d, _, _| abs_sum += d.abs());
                -k * (2.0 * delta).ln() - abs_sum / delta
            }
            Prior::Cmrf { n } => {
                assert_eq!(x.len(), n * n);
                let k = num_diffs(n) as f64;
                let mut tail = 0.0;
                for_each_diff(x, n, |d, _, _| {
                    let t = d / delta;
                    tail += (1.0 + t * t).ln();
                });
                -k * (PI * delta).ln() - tail
            }
        }
    }

    /// Gradient of `logpdf` with respect to `x`, or `None` when the variant
    /// is not differentiable.
    pub fn gradient(&self, x: &[f64], delta: f64) -> Option<Vec<f64>> {
        match *self {
            Prior::Gaussian { dim } => {
                assert_eq!(x.len(), dim);
                Some(x.iter().map(|v| -v / delta).collect())
            }
            Prior::Gmrf { n, .. } => {
                assert_eq!(x.len(), n * n);
                let prec = 1.0 / delta;
                let mut grad = apply_laplacian(x, n);
                for g in &mut grad {
                    *g *= -prec;
                }
                Some(grad)
            }
            Prior::Lmrf { .. } => None,
            Prior::Cmrf { n } => {
                assert_eq!(x.len(), n * n);
                let mut grad = vec![0.0; n * n];
                let d2 = delta * delta;
                for_each_diff(x, n, |d, from, to| {
                    // d(logpdf)/d(diff) for one Cauchy increment.
                    let w = -2.0 * d / (d2 + d * d);
                    if let Some(t) = to {
                        grad[t] += w;
                    }
                    if let Some(s) = from {
                        grad[s] -= w;
                    }
                });
                Some(grad)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Grid difference structure
// ---------------------------------------------------------------------------

/// Number of first-difference terms on an n x n grid with zero boundaries:
/// `n + 1` per line, `n` lines, two directions.
pub fn num_diffs(n: usize) -> usize {
    2 * n * (n + 1)
}

/// Visit every difference term `d = x[to] - x[from]`, where a `None`
/// endpoint lies on the zero boundary.
fn for_each_diff(x: &[f64], n: usize, mut f: impl FnMut(f64, Option<usize>, Option<usize>)) {
    // Vertical: column j, d_i = x[i][j] - x[i-1][j] for i in 0..=n.
    for j in 0..n {
        for i in 0..=n {
            let to = if i < n { Some(i * n + j) } else { None };
            let from = if i > 0 { Some((i - 1) * n + j) } else { None };
            let d = to.map_or(0.0, |t| x[t]) - from.map_or(0.0, |s| x[s]);
            f(d, from, to);
        }
    }
    // Horizontal: row i, d_j = x[i][j] - x[i][j-1] for j in 0..=n.
    for i in 0..n {
        for j in 0..=n {
            let to = if j < n { Some(i * n + j) } else { None };
            let from = if j > 0 { Some(i * n + (j - 1)) } else { None };
            let d = to.map_or(0.0, |t| x[t]) - from.map_or(0.0, |s| x[s]);
            f(d, from, to);
        }
    }
}

/// Apply the 5-point Dirichlet Laplacian `L = D^T D`:
/// `(Lx)[i,j] = 4 x[i,j] - x[i-1,j] - x[i+1,j] - x[i,j-1] - x[i,j+1]`
/// with out-of-grid neighbors treated as zero.
pub fn apply_laplacian(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let idx = i * n + j;
            let mut acc = 4.0 * x[idx];
            if i > 0 {
                acc -= x[idx - n];
            }
            if i + 1 < n {
                acc -= x[idx + n];
            }
            if j > 0 {
                acc -= x[idx - 1];
            }
            if j + 1 < n {
                acc -= x[idx + 1];
            }
            out[idx] = acc;
        }
    }
    out
}

/// `x^T L x`, accumulated as the sum of squared differences.
pub fn quadratic_form(x: &[f64], n: usize) -> f64 {
    let mut acc = 0.0;
    for_each_diff(x, n, |d, _, _| acc += d * d);
    acc
}

/// `ln det L` for the n x n Dirichlet Laplacian, from the analytic
/// eigenvalues `lambda_i + lambda_j`, `lambda_k = 2 - 2 cos(k pi / (n+1))`.
pub fn laplacian_logdet(n: usize) -> f64 {
    let eigs: Vec<f64> = (1..=n)
        .map(|k| 2.0 - 2.0 * (k as f64 * PI / (n as f64 + 1.0)).cos())
        .collect();
    let mut acc = 0.0;
    for li in &eigs {
        for lj in &eigs {
            acc += (li + lj).ln();
        }
    }
    acc
}

fn sum_sq(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Central finite-difference check of a prior gradient.
    fn check_gradient(prior: &Prior, x: &[f64], delta: f64) {
        let grad = prior.gradient(x, delta).expect("prior should be differentiable");
        let eps = 1e-6;
        for k in 0..x.len() {
            let mut xp = x.to_vec();
            let mut xm = x.to_vec();
            xp[k] += eps;
            xm[k] -= eps;
            let numerical = (prior.logpdf(&xp, delta) - prior.logpdf(&xm, delta)) / (2.0 * eps);
            assert!(
                (grad[k] - numerical).abs() < 1e-4,
                "coord {k}: analytic={}, numerical={}",
                grad[k],
                numerical
            );
        }
    }

    /// A fixed non-symmetric 3x3 test image.
    fn test_image() -> Vec<f64> {
        vec![0.3, -0.1, 0.7, 0.2, -0.5, 0.4, -0.2, 0.6, 0.1]
    }

    #[test]
    fn gaussian_logpdf_matches_closed_form() {
        let prior = Prior::gaussian(2);
        let x = [1.0, 0.0, -1.0, 2.0];
        let delta = 0.5;
        let expected = -2.0 * (TAU * delta).ln() - 6.0 / (2.0 * delta);
        assert!((prior.logpdf(&x, delta) - expected).abs() < 1e-12);
    }

    #[test]
    fn gaussian_gradient_finite_diff() {
        check_gradient(&Prior::gaussian(3), &test_image(), 0.07);
    }

    #[test]
    fn gmrf_gradient_finite_diff() {
        check_gradient(&Prior::gmrf(3), &test_image(), 0.3);
    }

    #[test]
    fn cmrf_gradient_finite_diff() {
        check_gradient(&Prior::cmrf(3), &test_image(), 0.25);
    }

    #[test]
    fn lmrf_has_no_gradient() {
        let prior = Prior::lmrf(3);
        assert!(!prior.differentiable());
        assert!(prior.gradient(&test_image(), 0.1).is_none());
    }

    #[test]
    fn quadratic_form_equals_laplacian_inner_product() {
        let x = test_image();
        let lx = apply_laplacian(&x, 3);
        let direct: f64 = x.iter().zip(lx.iter()).map(|(a, b)| a * b).sum();
        assert!((quadratic_form(&x, 3) - direct).abs() < 1e-12);
    }

    #[test]
    fn laplacian_of_single_pixel_is_stencil() {
        // One hot pixel in the middle of a 3x3 grid.
        let mut x = vec![0.0; 9];
        x[4] = 1.0;
        let lx = apply_laplacian(&x, 3);
        assert_eq!(lx[4], 4.0);
        assert_eq!(lx[1], -1.0);
        assert_eq!(lx[3], -1.0);
        assert_eq!(lx[5], -1.0);
        assert_eq!(lx[7], -1.0);
        assert_eq!(lx[0], 0.0);
    }

    #[test]
    fn logdet_matches_1x1_grid() {
        // For n = 1 the Laplacian is the scalar 4 (both eigenvalues are 2).
        assert!((laplacian_logdet(1) - 4.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn num_diffs_counts_both_directions() {
        assert_eq!(num_diffs(1), 4);
        assert_eq!(num_diffs(3), 24);
        assert_eq!(num_diffs(256), 2 * 256 * 257);
    }

    #[test]
    fn gmrf_prefers_smooth_images() {
        let prior = Prior::gmrf(3);
        let smooth = vec![0.2; 9];
        let mut rough = vec![0.2; 9];
        for (i, v) in rough.iter_mut().enumerate() {
            if i % 2 == 0 {
                *v = -0.2;
            }
        }
        assert!(prior.logpdf(&smooth, 0.1) > prior.logpdf(&rough, 0.1));
    }

    #[test]
    fn lmrf_penalizes_total_variation_linearly() {
        let prior = Prior::lmrf(2);
        let flat = vec![0.0; 4];
        let delta = 0.5;
        // One unit pixel on a 2x2 grid creates 4 unit differences.
        let mut one_hot = flat.clone();
        one_hot[0] = 1.0;
        let drop = prior.logpdf(&flat, delta) - prior.logpdf(&one_hot, delta);
        assert!((drop - 4.0 / delta).abs() < 1e-12);
    }

    #[test]
    fn cmrf_tails_are_heavier_than_gmrf() {
        // A large jump costs the Cauchy field much less than the Gaussian
        // field, relative to their own flat baselines.
        let n = 3;
        let delta = 0.1;
        let flat = vec![0.0; 9];
        let mut spike = flat.clone();
        spike[4] = 50.0;

        let gmrf = Prior::gmrf(n);
        let cmrf = Prior::cmrf(n);
        let gmrf_drop = gmrf.logpdf(&flat, delta) - gmrf.logpdf(&spike, delta);
        let cmrf_drop = cmrf.logpdf(&flat, delta) - cmrf.logpdf(&spike, delta);
        assert!(cmrf_drop < gmrf_drop);
    }

    #[test]
    fn smaller_delta_sharpens_gaussian_at_nonzero_x() {
        let prior = Prior::gaussian(2);
        let x = vec![1.0; 4];
        assert!(prior.logpdf(&x, 0.01) < prior.logpdf(&x, 1.0));
    }
}
