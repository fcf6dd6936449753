// Posterior assembly: Gaussian likelihood plus one of the prior variants,
// conditioned per evaluation on the sharpness parameter `delta`.

pub mod likelihood;
pub mod prior;

pub use likelihood::GaussianLikelihood;
pub use prior::Prior;

/// Unnormalized posterior log-density over the image vector.
///
/// `delta` is threaded through every call rather than stored, because the
/// serving surface lets each request override it.
#[derive(Debug, Clone)]
pub struct Posterior {
    likelihood: GaussianLikelihood,
    prior: Prior,
}

impl Posterior {
    pub fn new(likelihood: GaussianLikelihood, prior: Prior) -> Self {
        Self { likelihood, prior }
    }

    /// Number of unknowns (image pixels).
    pub fn dim(&self) -> usize {
        self.likelihood.dim()
    }

    /// `log p(x | y) = log p(y | x) + log p(x; delta)`, up to the evidence.
    pub fn logpdf(&self, x: &[f64], delta: f64) -> f64 {
        self.likelihood.logd(x) + self.prior.logpdf(x, delta)
    }

    /// Gradient of `logpdf` with respect to `x`. `None` when the prior is
    /// not differentiable.
    pub fn gradient(&self, x: &[f64], delta: f64) -> Option<Vec<f64>> {
        let prior_grad = self.prior.gradient(x, delta)?;
        let mut grad = self.likelihood.gradient(x);
        for (g, p) in grad.iter_mut().zip(prior_grad.iter()) {
            *g += p;
        }
        Some(grad)
    }

    pub fn differentiable(&self) -> bool {
        self.prior.differentiable()
    }
}
