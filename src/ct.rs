// The CT benchmark models: four posterior variants over one shared forward
// setup, plus the exact-solution passthrough.
//
// The variants differ only in prior construction, default sharpness, and
// gradient support, so they are a table over `PriorVariant` rather than
// separate types.

use crate::config::PriorsConfig;
use crate::data::Dataset;
use crate::model::{Model, ModelError, ModelRegistry, RequestConfig};
use crate::posterior::{GaussianLikelihood, Posterior, Prior};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Variant table
// ---------------------------------------------------------------------------

/// The four prior choices served as separate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorVariant {
    Gaussian,
    Gmrf,
    Lmrf,
    Cmrf,
}

impl PriorVariant {
    pub const ALL: [PriorVariant; 4] = [
        PriorVariant::Gaussian,
        PriorVariant::Gmrf,
        PriorVariant::Lmrf,
        PriorVariant::Cmrf,
    ];

    /// Wire name of the corresponding model.
    pub fn model_name(&self) -> &'static str {
        match self {
            PriorVariant::Gaussian => "CT_Gaussian",
            PriorVariant::Gmrf => "CT_GMRF",
            PriorVariant::Lmrf => "CT_LMRF",
            PriorVariant::Cmrf => "CT_CMRF",
        }
    }

    /// Default `delta` when a request does not override it. LMRF uses its
    /// own, broader default.
    pub fn default_delta(&self, priors: &PriorsConfig) -> f64 {
        match self {
            PriorVariant::Lmrf => priors.lmrf_delta,
            _ => priors.default_delta,
        }
    }

    pub fn supports_gradient(&self) -> bool {
        !matches!(self, PriorVariant::Lmrf)
    }

    fn build_prior(&self, n: usize) -> Prior {
        match self {
            PriorVariant::Gaussian => Prior::gaussian(n),
            PriorVariant::Gmrf => Prior::gmrf(n),
            PriorVariant::Lmrf => Prior::lmrf(n),
            PriorVariant::Cmrf => Prior::cmrf(n),
        }
    }
}

// ---------------------------------------------------------------------------
// Request config handling
// ---------------------------------------------------------------------------

/// Extract `delta` from the request config, falling back to the model
/// default. Present-but-invalid values are rejected rather than defaulted.
fn delta_from_config(config: &RequestConfig, default: f64) -> Result<f64, ModelError> {
    let Some(value) = config.get("delta") else {
        return Ok(default);
    };
    let delta = value.as_f64().ok_or_else(|| {
        ModelError::InvalidInput(format!("config option `delta` must be a number, got {value}"))
    })?;
    if !delta.is_finite() || delta <= 0.0 {
        return Err(ModelError::InvalidInput(format!(
            "config option `delta` must be positive and finite, got {delta}"
        )));
    }
    Ok(delta)
}

// ---------------------------------------------------------------------------
// Posterior models
// ---------------------------------------------------------------------------

/// One posterior variant served as a model: input is the image vector,
/// output is the single posterior log-density value.
pub struct CtPosteriorModel {
    variant: PriorVariant,
    posterior: Posterior,
    default_delta: f64,
}

impl CtPosteriorModel {
    pub fn new(variant: PriorVariant, posterior: Posterior, default_delta: f64) -> Self {
        Self {
            variant,
            posterior,
            default_delta,
        }
    }

    /// Check the evaluate/gradient input shape: one vector of `dim` values.
    fn check_input(&self, inputs: &[Vec<f64>]) -> Result<(), ModelError> {
        if inputs.len() != 1 {
            return Err(ModelError::InvalidInput(format!(
                "expected 1 input vector, got {}",
                inputs.len()
            )));
        }
        let dim = self.posterior.dim();
        if inputs[0].len() != dim {
            return Err(ModelError::InvalidInput(format!(
                "expected input of length {dim}, got {}",
                inputs[0].len()
            )));
        }
        Ok(())
    }
}

impl Model for CtPosteriorModel {
    fn name(&self) -> &str {
        self.variant.model_name()
    }

    fn input_sizes(&self, _config: &RequestConfig) -> Vec<usize> {
        vec![self.posterior.dim()]
    }

    fn output_sizes(&self, _config: &RequestConfig) -> Vec<usize> {
        vec![1]
    }

    fn supports_evaluate(&self) -> bool {
        true
    }

    fn supports_gradient(&self) -> bool {
        self.variant.supports_gradient()
    }

    fn evaluate(
        &self,
        inputs: &[Vec<f64>],
        config: &RequestConfig,
    ) -> Result<Vec<Vec<f64>>, ModelError> {
        self.check_input(inputs)?;
        let delta = delta_from_config(config, self.default_delta)?;
        let logpdf = self.posterior.logpdf(&inputs[0], delta);
        Ok(vec![vec![logpdf]])
    }

    fn gradient(
        &self,
        out_wrt: usize,
        in_wrt: usize,
        inputs: &[Vec<f64>],
        sens: &[f64],
        config: &RequestConfig,
    ) -> Result<Vec<f64>, ModelError> {
        if !self.supports_gradient() {
            return Err(ModelError::UnsupportedFeature(format!(
                "model {} does not support gradients",
                self.name()
            )));
        }
        if out_wrt != 0 || in_wrt != 0 {
            return Err(ModelError::InvalidInput(format!(
                "model {} has a single input and output; got outWrt={out_wrt}, inWrt={in_wrt}",
                self.name()
            )));
        }
        if sens.len() != 1 {
            return Err(ModelError::InvalidInput(format!(
                "expected sensitivity of length 1, got {}",
                sens.len()
            )));
        }
        self.check_input(inputs)?;
        let delta = delta_from_config(config, self.default_delta)?;

        // `differentiable()` tracks the variant table, so this always
        // produces a gradient for the variants that reach it.
        let mut grad = self
            .posterior
            .gradient(&inputs[0], delta)
            .ok_or_else(|| {
                ModelError::UnsupportedFeature(format!(
                    "model {} does not support gradients",
                    self.name()
                ))
            })?;
        for g in &mut grad {
            *g *= sens[0];
        }
        Ok(grad)
    }
}

// ---------------------------------------------------------------------------
// Exact solution model
// ---------------------------------------------------------------------------

/// Serves the exact phantom the synthetic data was generated from. Takes no
/// input and supports no gradient.
pub struct ExactSolutionModel {
    exact: Arc<Vec<f64>>,
}

impl ExactSolutionModel {
    pub const NAME: &'static str = "CT_ExactSolution";

    pub fn new(exact: Arc<Vec<f64>>) -> Self {
        Self { exact }
    }
}

impl Model for ExactSolutionModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_sizes(&self, _config: &RequestConfig) -> Vec<usize> {
        vec![0]
    }

    fn output_sizes(&self, _config: &RequestConfig) -> Vec<usize> {
        vec![self.exact.len()]
    }

    fn supports_evaluate(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        inputs: &[Vec<f64>],
        _config: &RequestConfig,
    ) -> Result<Vec<Vec<f64>>, ModelError> {
        let supplied: usize = inputs.iter().map(|v| v.len()).sum();
        if supplied != 0 {
            return Err(ModelError::InvalidInput(format!(
                "model {} takes no input, got {supplied} values",
                Self::NAME
            )));
        }
        Ok(vec![self.exact.as_ref().clone()])
    }
}

// ---------------------------------------------------------------------------
// Registry assembly
// ---------------------------------------------------------------------------

/// Build the full benchmark registry from a loaded dataset: one posterior
/// model per prior variant plus the exact solution.
pub fn build_registry(dataset: Dataset, priors: &PriorsConfig) -> ModelRegistry {
    let n = dataset.grid.size;
    let noise_std = dataset.noise_std;
    let operator = Arc::new(dataset.operator);
    let sinogram = Arc::new(dataset.sinogram);
    let exact = Arc::new(dataset.exact);

    let mut registry = ModelRegistry::new();
    for variant in PriorVariant::ALL {
        let likelihood =
            GaussianLikelihood::new(Arc::clone(&operator), Arc::clone(&sinogram), noise_std);
        let posterior = Posterior::new(likelihood, variant.build_prior(n));
        registry.register(Box::new(CtPosteriorModel::new(
            variant,
            posterior,
            variant.default_delta(priors),
        )));
    }
    registry.register(Box::new(ExactSolutionModel::new(exact)));
    registry
}
