//! HTTP API receiving deployment and registration events.
//!
//! Every response body is wrapped in an envelope:
//!
//! ```json
//! { "timestamp": 1700000000000, "req_id": "...", "status": 200, "data": { "ok": true } }
//! ```

use std::sync::{Arc, LazyLock};

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use notify::{ChannelError, DeploymentEvent, Notifier, RegistrationEvent};
use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};
use uuid::Uuid;

/// Request header carrying a caller-chosen request id.
pub const REQ_ID_HEADER: &str = "req_id";

/// Largest response body the envelope will re-wrap.
const MAX_ENVELOPE_BODY: usize = 1024 * 1024;

static REPOSITORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").unwrap());
static BRANCH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").unwrap());
static COMMIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{7,40}$").unwrap());

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub notifier: Arc<Notifier>,
}

/// Errors answered by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Payload(#[from] JsonRejection),

    #[error("failed to deliver notification: {0}")]
    Gateway(#[from] ChannelError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Payload(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/deployment", post(deployment_handler))
        .route("/registration", post(registration_handler))
        .route("/health", get(health_handler));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(middleware::from_fn(envelope))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Handlers
// ============================================================================

async fn deployment_handler(
    State(state): State<AppState>,
    payload: Result<Json<DeploymentEvent>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(event) = payload?;
    validate_deployment(&event)?;

    state.notifier.deployment(&event).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn registration_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationEvent>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(event) = payload?;
    if event.is_empty() {
        return Err(ApiError::Validation(
            "registration must have at least one field".to_string(),
        ));
    }

    state.notifier.registration(&event).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "active_threads": state.notifier.aggregator().active_threads().await,
    }))
}

/// Reject deployment events whose fields cannot be rendered meaningfully.
pub fn validate_deployment(event: &DeploymentEvent) -> Result<(), ApiError> {
    let checks = [
        ("repository", REPOSITORY.is_match(&event.repository)),
        ("branch", BRANCH.is_match(&event.branch)),
        ("commit", COMMIT.is_match(&event.commit)),
        ("name", !event.name.trim().is_empty()),
        ("by", !event.by.trim().is_empty()),
        ("stage", !event.stage.trim().is_empty()),
        ("status", !event.status.trim().is_empty()),
    ];

    match checks.iter().find(|(_, ok)| !ok) {
        Some((field, _)) => Err(ApiError::Validation(format!("invalid {field}"))),
        None => Ok(()),
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Wrap every response body as `{ timestamp, req_id, status, data }`.
async fn envelope(request: Request, next: Next) -> Response {
    let req_id = request
        .headers()
        .get(REQ_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    let data = match axum::body::to_bytes(body, MAX_ENVELOPE_BODY).await {
        Ok(bytes) if bytes.is_empty() => Value::Null,
        Ok(bytes) => serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) => {
            warn!(req_id = %req_id, error = %e, "Failed to buffer response body");
            Value::Null
        }
    };

    let wrapped = json!({
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "req_id": req_id,
        "status": parts.status.as_u16(),
        "data": data,
    });

    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(wrapped.to_string()))
}
