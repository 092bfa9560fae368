//! Error responses for the account endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors surfaced by the account handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A stored blob no longer deserializes as a snapshot. Served as an
    /// error rather than silently dropped so the operator notices.
    #[error("corrupt account row: {0}")]
    CorruptRecord(String),

    #[error("snapshot exceeds the size limit of {limit} bytes")]
    SnapshotTooLarge { limit: usize },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::CorruptRecord(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SnapshotTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Server-side faults are operator problems; the client only learns
        // the category.
        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = ?err, "database error");
                "database error".to_string()
            }
            AppError::CorruptRecord(detail) => {
                tracing::error!(detail = %detail, "corrupt account row");
                "stored account data is unreadable".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
