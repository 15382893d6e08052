use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{GatewayError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub thread_id: String,
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    // Keep malformed bodies in the JSON error format the client reads
    let Json(request) =
        payload.map_err(|rejection| GatewayError::InvalidRequest(rejection.body_text()))?;
    if request.message.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "message must not be empty".into(),
        ));
    }
    // Clients reset their session by sending an empty thread id
    let thread_id = request
        .thread_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let reply = state
        .orchestrator
        .continue_conversation(thread_id, &request.message)
        .await?;

    Ok(Json(ChatResponse {
        response: reply.text,
        thread_id: reply.thread_id,
    }))
}
