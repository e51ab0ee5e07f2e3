//! Stateless HTTP API.
//!
//! Every request carries its own payload (raw JSON or an encoded token), so
//! the server holds no corpus state and any instance can answer any request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/payload/normalize` | Raw payload JSON → normalized payload + digest |
//! | `POST` | `/payload/encode` | Raw payload JSON → token, fragment, link, digest |
//! | `POST` | `/payload/decode` | `{token}` (token, fragment or link) → payload + digest |
//! | `POST` | `/search` | `{token, query, top_k?, max_chars?}` → results + context |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_version` (400),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::config::Config;
use crate::search::query_payload;
use crate::share::share_link;
use linkrag_core::payload;
use linkrag_core::{Payload, PayloadError, RetrievedChunk};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Build the API router.
pub fn router(config: Arc<Config>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/payload/normalize", post(handle_normalize))
        .route("/payload/encode", post(handle_encode))
        .route("/payload/decode", post(handle_decode))
        .route("/search", post(handle_search))
        .layer(cors)
        .with_state(AppState { config })
}

/// Serve the API on `[server].bind` until `shutdown` is cancelled.
pub async fn run_server(config: &Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(config.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "linkrag server listening");
    println!("linkrag server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("server stopped");
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<PayloadError> for AppError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::UnsupportedVersion(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "unsupported_version",
                message: err.to_string(),
            },
            PayloadError::Validation(_) | PayloadError::Decoding(_) => bad_request(err.to_string()),
            PayloadError::Encoding(_) => internal(err.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /payload/* ============

#[derive(Serialize)]
struct PayloadResponse {
    payload: Payload,
    digest: String,
}

async fn handle_normalize(Json(raw): Json<Value>) -> Result<Json<PayloadResponse>, AppError> {
    let payload = payload::normalize(&raw)?;
    let digest = payload::digest(&payload)?;
    Ok(Json(PayloadResponse { payload, digest }))
}

#[derive(Serialize)]
struct EncodeResponse {
    token: String,
    fragment: String,
    link: String,
    digest: String,
}

async fn handle_encode(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<EncodeResponse>, AppError> {
    let payload = payload::normalize(&raw)?;
    let token = payload::encode(&payload)?;
    let link = share_link(&state.config, None, &payload).map_err(|e| internal(e.to_string()))?;
    debug!(docs = payload.docs.len(), token_len = token.len(), "encoded payload");
    Ok(Json(EncodeResponse {
        fragment: format!("#{}={}", payload::FRAGMENT_KEY, token),
        digest: payload::digest(&payload)?,
        token,
        link,
    }))
}

#[derive(Deserialize)]
struct DecodeRequest {
    token: String,
}

fn decode_source(source: &str) -> Result<Payload, AppError> {
    let token = payload::extract_encoded_from_link(source)
        .ok_or_else(|| bad_request("token must not be empty"))?;
    Ok(payload::decode(&token)?)
}

async fn handle_decode(Json(req): Json<DecodeRequest>) -> Result<Json<PayloadResponse>, AppError> {
    let payload = decode_source(&req.token)?;
    let digest = payload::digest(&payload)?;
    Ok(Json(PayloadResponse { payload, digest }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    token: String,
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    max_chars: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    digest: String,
    results: Vec<RetrievedChunk>,
    context: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let payload = decode_source(&req.token)?;
    let digest = payload::digest(&payload)?;
    let max_chars = req
        .max_chars
        .unwrap_or(state.config.context.max_chars);

    // Index construction is CPU-bound; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || {
        query_payload(&payload, &req.query, req.top_k, max_chars)
    })
    .await
    .map_err(|e| internal(format!("search task failed: {}", e)))?;

    Ok(Json(SearchResponse {
        digest,
        results: outcome.results,
        context: outcome.context,
    }))
}
