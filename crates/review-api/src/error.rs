//! # API Error Types
//!
//! Unified error handling for the HTTP layer.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use review_domain::DomainError;
use review_persistence::PersistenceError;

/// API-level errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::Domain(_) => StatusCode::BAD_REQUEST,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Domain(DomainError::UnknownMediaType(_)) => "UNKNOWN_MEDIA_TYPE",
            Self::Domain(DomainError::MissingField(_)) => "MISSING_FIELD",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        }

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "code": self.error_code(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
