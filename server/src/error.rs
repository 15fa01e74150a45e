use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pitch_core::PitchError;
use serde::Serialize;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl From<PitchError> for ApiError {
    fn from(e: PitchError) -> Self {
        match e {
            PitchError::InvalidDocument(_) | PitchError::UnknownContour(_) | PitchError::InvalidSource(_) => {
                ApiError::InvalidInput(e.to_string())
            }
            PitchError::NoDocument | PitchError::StaleLoad { .. } => ApiError::Conflict(e.to_string()),
            PitchError::Encode(_) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::InternalError(format!("worker task failed: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
