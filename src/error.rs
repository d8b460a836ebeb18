/// Unified error types for the study panel
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the panel
///
/// Every failure is scoped to the operation that raised it and renders as a
/// single displayable string.
#[derive(Error, Debug)]
pub enum PanelError {
    /// Database errors from the local store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Wrong admin password or a missing/invalid admin token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Wrong document password or invalid view token
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Required field empty or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Media host rejected or failed an upload
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Store write failed
    #[error("Store error: {0}")]
    Store(String),

    /// Live subscription failed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Same form submitted again while the first submission is in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Too many password attempts
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for PanelError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            PanelError::Authentication(_) | PanelError::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            PanelError::AccessDenied(_) => {
                (StatusCode::FORBIDDEN, "AccessDenied", self.to_string())
            }
            PanelError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            PanelError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            PanelError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            PanelError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Too many attempts, slow down".to_string(),
            ),
            PanelError::Upload(_) => (StatusCode::BAD_GATEWAY, "UploadFailed", self.to_string()),
            PanelError::Store(_) | PanelError::Subscription(_) => {
                (StatusCode::BAD_GATEWAY, "StoreUnavailable", self.to_string())
            }
            PanelError::Database(_)
            | PanelError::Internal(_)
            | PanelError::Io(_)
            | PanelError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for panel operations
pub type PanelResult<T> = Result<T, PanelError>;
