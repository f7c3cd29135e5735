//! HTTP endpoints.
//!
//! - `POST /agent/digitone/prompt` runs one prompt through the pipeline
//! - `GET /tools` lists tools, optionally for one machine
//! - `GET /health`

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use genieconf::AuthConfig;
use genieparams::Machine;
use geniedispatch::{pipeline::fingerprint, DispatchError, DispatchPipeline};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Header carrying the caller's credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DispatchPipeline>,
    pub auth: Arc<AuthConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// State that accepts any non-empty API key.
    pub fn new(pipeline: Arc<DispatchPipeline>) -> Self {
        Self {
            pipeline,
            auth: Arc::new(AuthConfig::default()),
            start_time: Instant::now(),
        }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Arc::new(auth);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/agent/digitone/prompt", post(handle_prompt))
        .route("/tools", get(handle_tools))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

fn api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Run one prompt.
///
/// The run happens on its own task. If the client goes away, this future is
/// dropped, the guard cancels the token, and the run stops without counting
/// usage.
async fn handle_prompt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PromptRequest>,
) -> Result<Response, ApiError> {
    let key = api_key(&headers)
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "Missing API key"))?;
    if !state.auth.allows(&key) {
        tracing::info!(credential = %fingerprint(&key), "Rejected unknown API key");
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Invalid API key"));
    }
    tracing::debug!(credential = %fingerprint(&key), "Prompt received");

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let pipeline = Arc::clone(&state.pipeline);
    let task =
        tokio::spawn(async move { pipeline.run(&request.prompt, &key, cancel).await });

    let joined = task.await;
    guard.disarm();

    let outcome = joined
        .map_err(|e| {
            tracing::error!(error = %e, "Dispatch task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?
        .map_err(ApiError::from)?;

    Ok(Json(outcome.items).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ToolsQuery {
    pub machine: Option<String>,
}

async fn handle_tools(
    State(state): State<AppState>,
    Query(query): Query<ToolsQuery>,
) -> Result<Response, ApiError> {
    let machine = query
        .machine
        .as_deref()
        .map(str::parse::<Machine>)
        .transpose()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e))?;

    Ok(Json(state.pipeline.registry().infos(machine)).into_response())
}

/// Health check endpoint
async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();

    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": uptime.as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "tool_count": state.pipeline.registry().len(),
    }))
}
