// Wire schema for the JSON-over-HTTP model-serving protocol (version 1.0).
//
// Requests address models by name; vectors travel as JSON arrays of numbers.
// Errors use a fixed `{"error": {"type", "message"}}` envelope so generic
// clients can dispatch on the type string.

pub mod client;
pub mod server;

use crate::model::{ModelError, RequestConfig};
use serde::{Deserialize, Serialize};

/// Protocol version reported by `/Info`.
pub const PROTOCOL_VERSION: f64 = 1.0;

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: f64,
    pub models: Vec<String>,
}

/// Body shared by `/InputSizes`, `/OutputSizes`, and `/ModelInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub name: String,
    #[serde(default)]
    pub config: RequestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSizesResponse {
    #[serde(rename = "inputSizes")]
    pub input_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSizesResponse {
    #[serde(rename = "outputSizes")]
    pub output_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub support: SupportFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportFlags {
    #[serde(rename = "Evaluate")]
    pub evaluate: bool,
    #[serde(rename = "Gradient")]
    pub gradient: bool,
    #[serde(rename = "ApplyJacobian")]
    pub apply_jacobian: bool,
    #[serde(rename = "ApplyHessian")]
    pub apply_hessian: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub name: String,
    pub input: Vec<Vec<f64>>,
    #[serde(default)]
    pub config: RequestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub output: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientRequest {
    pub name: String,
    #[serde(rename = "outWrt")]
    pub out_wrt: usize,
    #[serde(rename = "inWrt")]
    pub in_wrt: usize,
    pub input: Vec<Vec<f64>>,
    pub sens: Vec<f64>,
    #[serde(default)]
    pub config: RequestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientResponse {
    pub output: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Protocol-level request failures. Each variant maps onto one `type` string
/// of the error envelope.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("{0}")]
    UnsupportedFeature(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Malformed(String),
}

impl BridgeError {
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::ModelNotFound(_) => "ModelNotFound",
            BridgeError::UnsupportedFeature(_) => "UnsupportedFeature",
            BridgeError::InvalidInput(_) => "InvalidInput",
            BridgeError::Malformed(_) => "MalformedRequest",
        }
    }

    pub fn to_envelope(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl From<ModelError> for BridgeError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnsupportedFeature(msg) => BridgeError::UnsupportedFeature(msg),
            ModelError::InvalidInput(msg) => BridgeError::InvalidInput(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_response_uses_camel_case_version_key() {
        let info = InfoResponse {
            protocol_version: PROTOCOL_VERSION,
            models: vec!["CT_Gaussian".into()],
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["protocolVersion"], 1.0);
        assert_eq!(json["models"][0], "CT_Gaussian");
    }

    #[test]
    fn model_request_config_defaults_to_empty() {
        let request: ModelRequest =
            serde_json::from_str(r#"{"name": "CT_GMRF"}"#).unwrap();
        assert_eq!(request.name, "CT_GMRF");
        assert!(request.config.is_empty());
    }

    #[test]
    fn evaluate_request_round_trips() {
        let raw = r#"{"name":"CT_Gaussian","input":[[0.1,0.2]],"config":{"delta":0.5}}"#;
        let request: EvaluateRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.input, vec![vec![0.1, 0.2]]);
        assert_eq!(request.config.get("delta").unwrap().as_f64(), Some(0.5));

        let back = serde_json::to_string(&request).unwrap();
        let again: EvaluateRequest = serde_json::from_str(&back).unwrap();
        assert_eq!(again.name, "CT_Gaussian");
    }

    #[test]
    fn gradient_request_uses_wrt_keys() {
        let raw = r#"{"name":"m","outWrt":0,"inWrt":0,"input":[[1.0]],"sens":[1.0]}"#;
        let request: GradientRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.out_wrt, 0);
        assert_eq!(request.in_wrt, 0);
        assert!(request.config.is_empty());
    }

    #[test]
    fn support_flags_serialize_capitalized() {
        let flags = SupportFlags {
            evaluate: true,
            gradient: false,
            apply_jacobian: false,
            apply_hessian: false,
        };
        let json = serde_json::to_value(&flags).unwrap();
        assert_eq!(json["Evaluate"], true);
        assert_eq!(json["Gradient"], false);
        assert_eq!(json["ApplyJacobian"], false);
        assert_eq!(json["ApplyHessian"], false);
    }

    #[test]
    fn error_envelope_has_type_and_message() {
        let err = BridgeError::ModelNotFound("CT_Unknown".into());
        let json = serde_json::to_value(err.to_envelope()).unwrap();
        assert_eq!(json["error"]["type"], "ModelNotFound");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("CT_Unknown"));
    }

    #[test]
    fn error_kinds_map_one_to_one() {
        assert_eq!(BridgeError::ModelNotFound("x".into()).kind(), "ModelNotFound");
        assert_eq!(
            BridgeError::UnsupportedFeature("x".into()).kind(),
            "UnsupportedFeature"
        );
        assert_eq!(BridgeError::InvalidInput("x".into()).kind(), "InvalidInput");
        assert_eq!(BridgeError::Malformed("x".into()).kind(), "MalformedRequest");
    }

    #[test]
    fn model_errors_convert_to_bridge_errors() {
        let err: BridgeError = ModelError::InvalidInput("bad shape".into()).into();
        assert_eq!(err.kind(), "InvalidInput");

        let err: BridgeError = ModelError::UnsupportedFeature("no gradient".into()).into();
        assert_eq!(err.kind(), "UnsupportedFeature");
    }
}
