use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{GatewayError, Result};
use crate::models::DocumentContext;

/// Multipart field carrying the document
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub thread_id: String,
}

/// POST /upload - start a conversation grounded in a text document
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let max_bytes = state.upload.max_bytes;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| read_error(e, max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| read_error(e, max_bytes))?;
        if bytes.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(GatewayError::InvalidRequest(format!(
            "No file provided in the '{FILE_FIELD}' field"
        )));
    };

    let document = validate_document(&filename, &bytes, &state.upload.allowed_extension)?;
    let thread_id = state.orchestrator.start_conversation(&document).await?;

    Ok(Json(UploadResponse {
        message: format!(
            "File '{}' uploaded successfully. You can now ask questions about it.",
            document.filename
        ),
        filename: document.filename,
        thread_id,
    }))
}

fn too_large(max_bytes: usize) -> GatewayError {
    GatewayError::InvalidRequest(format!("File exceeds the {max_bytes} byte upload limit"))
}

fn read_error(err: MultipartError, max_bytes: usize) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_bytes)
    } else {
        GatewayError::InvalidRequest(format!("Failed to read upload: {err}"))
    }
}

/// Check an uploaded file and turn it into a document context
pub fn validate_document(
    raw_filename: &str,
    bytes: &[u8],
    allowed_extension: &str,
) -> Result<DocumentContext> {
    // Some browsers send the full client-side path
    let filename = raw_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if filename.is_empty() {
        return Err(GatewayError::InvalidRequest("Uploaded file has no name".into()));
    }

    let allowed = allowed_extension.trim_start_matches('.');
    let has_allowed_extension = filename
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(allowed));
    if !has_allowed_extension {
        return Err(GatewayError::InvalidRequest(format!(
            "Only .{allowed} files are supported"
        )));
    }

    let content = std::str::from_utf8(bytes).map_err(|_| {
        GatewayError::InvalidRequest("File must be UTF-8 encoded text".into())
    })?;
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(GatewayError::InvalidRequest("File is empty".into()));
    }

    Ok(DocumentContext::new(filename, content))
}
