// HTTP client for the model-serving protocol.
//
// Thin typed wrapper over reqwest; used by the integration tests to exercise
// the server over a real socket, and usable by external Rust callers that
// want to query a running benchmark server.

use crate::bridge::{
    ErrorResponse, EvaluateRequest, EvaluateResponse, GradientRequest, GradientResponse,
    InfoResponse, InputSizesResponse, ModelInfoResponse, ModelRequest, OutputSizesResponse,
    SupportFlags,
};
use crate::model::RequestConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {kind}: {message}")]
    Remote { kind: String, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Client for one benchmark server.
pub struct BridgeClient {
    base: String,
    http: reqwest::Client,
}

impl BridgeClient {
    /// Create a client for the server at `base` (e.g. `http://localhost:4243`).
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            base,
            http: reqwest::Client::new(),
        }
    }

    /// Protocol version and model names served.
    pub async fn info(&self) -> Result<InfoResponse, ClientError> {
        let response = self.http.get(format!("{}/Info", self.base)).send().await?;
        decode(response).await
    }

    /// Capability flags for one model.
    pub async fn model_info(&self, name: &str) -> Result<SupportFlags, ClientError> {
        let response: ModelInfoResponse = self
            .post("/ModelInfo", &model_request(name, RequestConfig::new()))
            .await?;
        Ok(response.support)
    }

    pub async fn input_sizes(
        &self,
        name: &str,
        config: RequestConfig,
    ) -> Result<Vec<usize>, ClientError> {
        let response: InputSizesResponse =
            self.post("/InputSizes", &model_request(name, config)).await?;
        Ok(response.input_sizes)
    }

    pub async fn output_sizes(
        &self,
        name: &str,
        config: RequestConfig,
    ) -> Result<Vec<usize>, ClientError> {
        let response: OutputSizesResponse =
            self.post("/OutputSizes", &model_request(name, config)).await?;
        Ok(response.output_sizes)
    }

    pub async fn evaluate(
        &self,
        name: &str,
        input: Vec<Vec<f64>>,
        config: RequestConfig,
    ) -> Result<Vec<Vec<f64>>, ClientError> {
        let request = EvaluateRequest {
            name: name.to_string(),
            input,
            config,
        };
        let response: EvaluateResponse = self.post("/Evaluate", &request).await?;
        Ok(response.output)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn gradient(
        &self,
        name: &str,
        out_wrt: usize,
        in_wrt: usize,
        input: Vec<Vec<f64>>,
        sens: Vec<f64>,
        config: RequestConfig,
    ) -> Result<Vec<f64>, ClientError> {
        let request = GradientRequest {
            name: name.to_string(),
            out_wrt,
            in_wrt,
            input,
            sens,
            config,
        };
        let response: GradientResponse = self.post("/Gradient", &request).await?;
        Ok(response.output)
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp, ClientError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }
}

fn model_request(name: &str, config: RequestConfig) -> ModelRequest {
    ModelRequest {
        name: name.to_string(),
        config,
    }
}

/// Decode a success body, or surface the server's error envelope.
async fn decode<Resp: DeserializeOwned>(response: reqwest::Response) -> Result<Resp, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        if let Ok(envelope) = serde_json::from_slice::<ErrorResponse>(&bytes) {
            return Err(ClientError::Remote {
                kind: envelope.error.kind,
                message: envelope.error.message,
            });
        }
        return Err(ClientError::Decode(format!(
            "HTTP {status} with unrecognized body"
        )));
    }

    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}
