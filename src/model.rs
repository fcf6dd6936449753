// The served-model abstraction: the evaluate/gradient surface a model
// exposes over the wire, plus the name -> model registry.

use serde_json::Value;
use thiserror::Error;

/// Per-request configuration object. Models pick out the options they
/// recognize (currently only `delta`) and ignore the rest.
pub type RequestConfig = serde_json::Map<String, Value>;

/// Errors a model can produce while handling a request. The serving layer
/// maps these onto the wire error schema.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0}")]
    UnsupportedFeature(String),

    #[error("{0}")]
    InvalidInput(String),
}

/// A model served over the bridge protocol.
///
/// Evaluation is synchronous and CPU-bound; the server offloads calls to the
/// blocking pool, so implementations must be `Send + Sync` and immutable
/// after construction.
pub trait Model: Send + Sync {
    /// The name models are addressed by on the wire.
    fn name(&self) -> &str;

    /// Lengths of the input vectors `evaluate` expects.
    fn input_sizes(&self, config: &RequestConfig) -> Vec<usize>;

    /// Lengths of the output vectors `evaluate` produces.
    fn output_sizes(&self, config: &RequestConfig) -> Vec<usize>;

    fn supports_evaluate(&self) -> bool {
        false
    }

    fn supports_gradient(&self) -> bool {
        false
    }

    fn evaluate(
        &self,
        _inputs: &[Vec<f64>],
        _config: &RequestConfig,
    ) -> Result<Vec<Vec<f64>>, ModelError> {
        Err(ModelError::UnsupportedFeature(format!(
            "model {} does not support evaluation",
            self.name()
        )))
    }

    fn gradient(
        &self,
        _out_wrt: usize,
        _in_wrt: usize,
        _inputs: &[Vec<f64>],
        _sens: &[f64],
        _config: &RequestConfig,
    ) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::UnsupportedFeature(format!(
            "model {} does not support gradients",
            self.name()
        )))
    }
}

/// Ordered collection of served models. Lookup is linear; registries hold a
/// handful of models and are built once at startup.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<Box<dyn Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: Box<dyn Model>) {
        self.models.push(model);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Model> {
        self.models
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    /// Model names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal model that only reports sizes.
    struct Stub {
        name: &'static str,
    }

    impl Model for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn input_sizes(&self, _config: &RequestConfig) -> Vec<usize> {
            vec![3]
        }

        fn output_sizes(&self, _config: &RequestConfig) -> Vec<usize> {
            vec![1]
        }
    }

    #[test]
    fn registry_preserves_registration_order() {
        let mut registry = ModelRegistry::new();
        registry.register(Box::new(Stub { name: "b" }));
        registry.register(Box::new(Stub { name: "a" }));

        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn lookup_by_name() {
        let mut registry = ModelRegistry::new();
        registry.register(Box::new(Stub { name: "model" }));

        assert!(registry.get("model").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn default_capabilities_are_refusals() {
        let stub = Stub { name: "stub" };
        assert!(!stub.supports_evaluate());
        assert!(!stub.supports_gradient());

        let config = RequestConfig::new();
        let err = stub.evaluate(&[], &config).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedFeature(_)));

        let err = stub.gradient(0, 0, &[], &[], &config).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedFeature(_)));
    }
}
