use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

use crate::services::ServiceError;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// Everything a client sees is the `{"error": ..., "status": ...}` envelope;
/// internal failure detail is logged here and never echoed back.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            err @ ServiceError::Forbidden(_) => {
                Self::new(StatusCode::FORBIDDEN, err.to_string())
            }
            err @ ServiceError::NotFound(_) => Self::not_found(err.to_string()),
            ServiceError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            err @ ServiceError::SizeLimitExceeded { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            ServiceError::LockBusy { resource } => {
                warn!(resource, "rejected request while metadata lock was busy");
                Self::new(
                    StatusCode::CONFLICT,
                    "the storage metadata is busy with another change, please retry",
                )
            }
            ServiceError::Internal(source) => {
                error!(error = ?source, "internal error while handling request");
                Self::internal("internal server error")
            }
        }
    }
}
