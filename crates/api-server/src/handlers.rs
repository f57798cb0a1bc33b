//! HTTP request handlers for the inference entry point

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::types::{AnalyzeResponse, ErrorResponse, HealthResponse};
use crate::ApiState;
use action_infer_common::PipelineError;
use action_infer_pipeline::classify_clip;

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_available: state.host.is_available(),
        labels: state.labels.len(),
    })
}

/// Classify an uploaded video clip
///
/// Accepts a multipart form with a `file` part holding the clip bytes. The
/// clip is stored under a request-unique temp name (never the client-supplied
/// filename), classified on the blocking worker pool, and removed on every
/// exit path when the temp guard drops.
pub async fn analyze(State(state): State<ApiState>, mut multipart: Multipart) -> Response {
    let request_id = Uuid::new_v4();
    info!("Analyze request {}", request_id);

    // Pull the video part out of the multipart form
    let (extension, bytes) = loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return error_body(StatusCode::BAD_REQUEST, "No video file in request");
            }
            Err(e) => {
                warn!("Request {}: malformed multipart body: {}", request_id, e);
                return error_body(StatusCode::BAD_REQUEST, "Malformed multipart body");
            }
        };

        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }

        let extension = field.file_name().and_then(sanitize_extension);
        match field.bytes().await {
            Ok(bytes) => break (extension, bytes),
            Err(e) => {
                warn!("Request {}: failed to read upload: {}", request_id, e);
                return error_body(StatusCode::BAD_REQUEST, "Failed to read upload");
            }
        }
    };

    // Request-unique backing storage; the guard removes the file on drop,
    // which covers success, validation failure, and panic paths alike
    let suffix = extension.map_or_else(String::new, |ext| format!(".{ext}"));
    let temp_file = match tempfile::Builder::new()
        .prefix("clip-")
        .suffix(&suffix)
        .tempfile()
    {
        Ok(file) => file,
        Err(e) => {
            error!("Request {}: failed to create temp file: {}", request_id, e);
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload");
        }
    };

    let clip_path: PathBuf = temp_file.path().to_path_buf();
    if let Err(e) = tokio::fs::write(&clip_path, &bytes).await {
        error!("Request {}: failed to write temp file: {}", request_id, e);
        return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload");
    }

    info!(
        "Request {}: stored {} byte clip at {}",
        request_id,
        bytes.len(),
        clip_path.display()
    );

    // The pipeline is synchronous CPU-bound work; run it off the async runtime
    let host = state.host.clone();
    let labels = state.labels.clone();
    let result =
        tokio::task::spawn_blocking(move || classify_clip(&clip_path, &labels, &host)).await;

    let response = match result {
        Ok(Ok(prediction)) => {
            info!(
                "Request {}: {} ({:.2}%)",
                request_id, prediction.action, prediction.confidence
            );
            (StatusCode::OK, Json(AnalyzeResponse::from(prediction))).into_response()
        }
        Ok(Err(e)) => {
            if e.is_client_error() {
                info!("Request {}: rejected: {}", request_id, e);
            } else {
                error!("Request {}: pipeline failure: {}", request_id, e);
            }
            error_response(&e).into_response()
        }
        Err(e) => {
            error!("Request {}: inference task panicked: {}", request_id, e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Inference task failed")
        }
    };

    drop(temp_file);
    response
}

/// Map a pipeline error to the wire contract
///
/// Validation and retrieval failures map to the client-error class; model
/// unavailability and internal failures map to the server-error class. Only
/// the structured message leaves this boundary.
pub(crate) fn error_response(err: &PipelineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let message = match err {
        PipelineError::ClipTooShort { .. } => "Video too short".to_string(),
        PipelineError::FrameExtraction { .. } => "Frame extraction failed".to_string(),
        PipelineError::ModelUnavailable => "Model not loaded".to_string(),
        PipelineError::Decode(message) | PipelineError::Internal(message) => message.clone(),
    };

    (status, Json(ErrorResponse { error: message }))
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Keep only a short alphanumeric extension from a client-supplied filename
fn sanitize_extension(file_name: &str) -> Option<String> {
    let extension = std::path::Path::new(file_name).extension()?.to_str()?;
    if extension.is_empty()
        || extension.len() > 5
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_clip_too_short() {
        let (status, Json(body)) = error_response(&PipelineError::ClipTooShort {
            total_frames: 5,
            required: 16,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Video too short");
    }

    #[test]
    fn test_error_response_frame_extraction() {
        let (status, Json(body)) = error_response(&PipelineError::FrameExtraction {
            expected: 16,
            got: 0,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Frame extraction failed");
    }

    #[test]
    fn test_error_response_model_unavailable() {
        let (status, Json(body)) = error_response(&PipelineError::ModelUnavailable);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Model not loaded");
    }

    #[test]
    fn test_error_response_decode_is_client_class() {
        let (status, Json(body)) = error_response(&PipelineError::Decode("bad container".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "bad container");
    }

    #[test]
    fn test_error_response_internal_carries_message() {
        let (status, Json(body)) = error_response(&PipelineError::Internal("stack failed".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "stack failed");
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("clip.mp4"), Some("mp4".to_string()));
        assert_eq!(sanitize_extension("CLIP.MOV"), Some("mov".to_string()));
        assert_eq!(sanitize_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(sanitize_extension("noextension"), None);
        assert_eq!(sanitize_extension("weird.../../etc"), None);
        assert_eq!(sanitize_extension("clip.verylongext"), None);
    }
}
