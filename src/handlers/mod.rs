/// HTTP handlers for the gateway endpoints
pub mod chat;
pub mod health;
pub mod upload;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::UploadConfig;
use crate::error::GatewayError;
use crate::orchestrator::SessionOrchestrator;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub upload: Arc<UploadConfig>,
}

impl AppState {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, upload: UploadConfig) -> Self {
        Self {
            orchestrator,
            upload: Arc::new(upload),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    // The browser client is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Multipart framing adds a little on top of the file itself
    let body_limit = state.upload.max_bytes.saturating_add(16 * 1024);

    Router::new()
        .route("/health", get(health::health))
        .route("/upload", post(upload::upload))
        .route("/chat", post(chat::chat))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// JSON error body. `detail` carries the message the client shows to the user.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            GatewayError::RunFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "run_failed"),
            GatewayError::Upstream { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            GatewayError::Config(_) | GatewayError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        // Client errors carry only the reason, not the taxonomy prefix
        let detail = match self {
            GatewayError::InvalidRequest(reason) => reason,
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code, detail = %detail, "Request failed");
        } else {
            tracing::warn!(code, detail = %detail, "Request rejected");
        }

        (
            status,
            Json(ErrorBody {
                error: code.to_string(),
                detail,
            }),
        )
            .into_response()
    }
}
