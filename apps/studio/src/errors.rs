use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy shared by the timeline core and its collaborators.
///
/// Dangling entity references are deliberately absent: they resolve to a
/// placeholder at read time and are never raised.
#[derive(Debug, Error)]
pub enum StoryboardError {
    /// Malformed structural input. The caller must discard the result.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload or generative call failed. Core state was not touched.
    #[error("{operation} failed: {message}")]
    External {
        operation: &'static str,
        message: String,
    },

    /// Persistence write or read failed. Local state stays authoritative.
    #[error("Sync error: {0}")]
    Sync(String),
}

impl StoryboardError {
    pub fn external(operation: &'static str, message: impl Into<String>) -> Self {
        StoryboardError::External {
            operation,
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StoryboardError {
    fn from(e: sqlx::Error) -> Self {
        StoryboardError::Sync(e.to_string())
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoryboardError> for AppError {
    fn from(e: StoryboardError) -> Self {
        match e {
            StoryboardError::Validation(msg) => AppError::Validation(msg),
            StoryboardError::External {
                operation: "upload",
                message,
            } => AppError::Storage(message),
            StoryboardError::External { operation, message } => {
                AppError::Generation(format!("{operation}: {message}"))
            }
            StoryboardError::Sync(msg) => AppError::Sync(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Generation(msg) => {
                tracing::error!("Generation error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_ERROR",
                    "The storyboard generator failed; nothing was changed".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORAGE_ERROR",
                    "The asset upload failed; nothing was changed".to_string(),
                )
            }
            AppError::Sync(msg) => {
                tracing::error!("Sync error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SYNC_ERROR",
                    "The document store is unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_failure_maps_to_storage() {
        let err: AppError = StoryboardError::external("upload", "bucket missing").into();
        assert!(matches!(err, AppError::Storage(msg) if msg == "bucket missing"));
    }

    #[test]
    fn test_generation_failure_maps_to_generation() {
        let err: AppError = StoryboardError::external("generate", "timeout").into();
        assert!(matches!(err, AppError::Generation(msg) if msg.contains("timeout")));
    }

    #[test]
    fn test_validation_status_code() {
        let resp = AppError::Validation("duplicate shot id".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
