// HTTP serving loop for the model protocol.
//
// One hyper service over a shared, immutable registry. Posterior evaluations
// walk a multi-million-entry sparse matrix, so they run on the blocking pool
// rather than the request task.

use crate::bridge::{
    BridgeError, ErrorBody, ErrorResponse, EvaluateRequest, EvaluateResponse, GradientRequest,
    GradientResponse, InfoResponse, InputSizesResponse, ModelInfoResponse, ModelRequest,
    OutputSizesResponse, SupportFlags, PROTOCOL_VERSION,
};
use crate::model::{Model, ModelRegistry};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bind the server and return its actual local address together with the
/// serving future. Binding eagerly lets callers use port 0 and learn the
/// assigned port before the loop starts.
pub fn bind(
    addr: SocketAddr,
    registry: Arc<ModelRegistry>,
) -> Result<
    (
        SocketAddr,
        impl Future<Output = Result<(), hyper::Error>>,
    ),
    hyper::Error,
> {
    let make_svc = make_service_fn(move |_conn| {
        let registry = Arc::clone(&registry);
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                handle_request(req, Arc::clone(&registry))
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    let local_addr = server.local_addr();
    Ok((local_addr, server))
}

/// Run the serving loop on `addr` until the task is cancelled or the process
/// exits.
pub async fn serve(addr: SocketAddr, registry: Arc<ModelRegistry>) -> anyhow::Result<()> {
    let (local_addr, server) = bind(addr, registry)?;
    info!("model server listening on {local_addr}");
    server.await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Request dispatch
// ---------------------------------------------------------------------------

async fn handle_request(
    req: Request<Body>,
    registry: Arc<ModelRegistry>,
) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{method} {path}");

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/Info") => json_response(
            StatusCode::OK,
            &InfoResponse {
                protocol_version: PROTOCOL_VERSION,
                models: registry.names(),
            },
        ),
        (&Method::POST, "/InputSizes") => handle_input_sizes(req, &registry).await,
        (&Method::POST, "/OutputSizes") => handle_output_sizes(req, &registry).await,
        (&Method::POST, "/ModelInfo") => handle_model_info(req, &registry).await,
        (&Method::POST, "/Evaluate") => handle_evaluate(req, Arc::clone(&registry)).await,
        (&Method::POST, "/Gradient") => handle_gradient(req, Arc::clone(&registry)).await,
        (&Method::POST, "/ApplyJacobian") => {
            handle_unsupported_apply(req, &registry, "Jacobian").await
        }
        (&Method::POST, "/ApplyHessian") => {
            handle_unsupported_apply(req, &registry, "Hessian").await
        }
        _ => error_response(
            StatusCode::NOT_FOUND,
            &BridgeError::Malformed(format!("no such endpoint: {method} {path}")),
        ),
    };

    Ok(response)
}

async fn handle_input_sizes(req: Request<Body>, registry: &ModelRegistry) -> Response<Body> {
    let request: ModelRequest = match parse_body(req).await {
        Ok(r) => r,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };
    match lookup(registry, &request.name) {
        Ok(model) => json_response(
            StatusCode::OK,
            &InputSizesResponse {
                input_sizes: model.input_sizes(&request.config),
            },
        ),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err),
    }
}

async fn handle_output_sizes(req: Request<Body>, registry: &ModelRegistry) -> Response<Body> {
    let request: ModelRequest = match parse_body(req).await {
        Ok(r) => r,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };
    match lookup(registry, &request.name) {
        Ok(model) => json_response(
            StatusCode::OK,
            &OutputSizesResponse {
                output_sizes: model.output_sizes(&request.config),
            },
        ),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err),
    }
}

async fn handle_model_info(req: Request<Body>, registry: &ModelRegistry) -> Response<Body> {
    let request: ModelRequest = match parse_body(req).await {
        Ok(r) => r,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };
    match lookup(registry, &request.name) {
        Ok(model) => json_response(
            StatusCode::OK,
            &ModelInfoResponse {
                support: SupportFlags {
                    evaluate: model.supports_evaluate(),
                    gradient: model.supports_gradient(),
                    apply_jacobian: false,
                    apply_hessian: false,
                },
            },
        ),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err),
    }
}

async fn handle_evaluate(req: Request<Body>, registry: Arc<ModelRegistry>) -> Response<Body> {
    let request: EvaluateRequest = match parse_body(req).await {
        Ok(r) => r,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };

    let result = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f64>>, BridgeError> {
        let model = lookup(&registry, &request.name)?;
        if !model.supports_evaluate() {
            return Err(BridgeError::UnsupportedFeature(format!(
                "model {} does not support evaluation",
                request.name
            )));
        }
        model
            .evaluate(&request.input, &request.config)
            .map_err(BridgeError::from)
    })
    .await;

    match result {
        Ok(Ok(output)) => json_response(StatusCode::OK, &EvaluateResponse { output }),
        Ok(Err(err)) => error_response(StatusCode::BAD_REQUEST, &err),
        Err(join_err) => internal_error(&join_err),
    }
}

async fn handle_gradient(req: Request<Body>, registry: Arc<ModelRegistry>) -> Response<Body> {
    let request: GradientRequest = match parse_body(req).await {
        Ok(r) => r,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };

    let result = tokio::task::spawn_blocking(move || -> Result<Vec<f64>, BridgeError> {
        let model = lookup(&registry, &request.name)?;
        if !model.supports_gradient() {
            return Err(BridgeError::UnsupportedFeature(format!(
                "model {} does not support gradients",
                request.name
            )));
        }
        model
            .gradient(
                request.out_wrt,
                request.in_wrt,
                &request.input,
                &request.sens,
                &request.config,
            )
            .map_err(BridgeError::from)
    })
    .await;

    match result {
        Ok(Ok(output)) => json_response(StatusCode::OK, &GradientResponse { output }),
        Ok(Err(err)) => error_response(StatusCode::BAD_REQUEST, &err),
        Err(join_err) => internal_error(&join_err),
    }
}

/// `/ApplyJacobian` and `/ApplyHessian`: no benchmark supports these, but the
/// request is still parsed far enough to distinguish an unknown model from an
/// unsupported operation.
async fn handle_unsupported_apply(
    req: Request<Body>,
    registry: &ModelRegistry,
    operation: &str,
) -> Response<Body> {
    let request: ModelRequest = match parse_body(req).await {
        Ok(r) => r,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };
    let err = match lookup(registry, &request.name) {
        Ok(_) => BridgeError::UnsupportedFeature(format!(
            "model {} does not support {operation} application",
            request.name
        )),
        Err(err) => err,
    };
    error_response(StatusCode::BAD_REQUEST, &err)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lookup<'a>(registry: &'a ModelRegistry, name: &str) -> Result<&'a dyn Model, BridgeError> {
    registry
        .get(name)
        .ok_or_else(|| BridgeError::ModelNotFound(name.to_string()))
}

async fn parse_body<T: DeserializeOwned>(req: Request<Body>) -> Result<T, BridgeError> {
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| BridgeError::Malformed(format!("failed to read request body: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| BridgeError::Malformed(format!("invalid request JSON: {e}")))
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response<Body> {
    let body = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    match Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
    {
        Ok(response) => response,
        Err(e) => {
            warn!("failed to build response: {e}");
            Response::new(Body::empty())
        }
    }
}

fn error_response(status: StatusCode, err: &BridgeError) -> Response<Body> {
    json_response(status, &err.to_envelope())
}

fn internal_error(join_err: &tokio::task::JoinError) -> Response<Body> {
    warn!("evaluation task failed: {join_err}");
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &ErrorResponse {
            error: ErrorBody {
                kind: "InternalError".to_string(),
                message: format!("evaluation task failed: {join_err}"),
            },
        },
    )
}
