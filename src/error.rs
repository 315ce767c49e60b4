//! Server error types with HTTP status code mapping

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ferropath_core::Error as CoreError;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure answering one request
#[derive(Error, Debug)]
pub enum ApiError {
    /// Core library error
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Query parameter that is not a number
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Blocking task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::InvalidCoordinate { .. }) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::CollaboratorUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(CoreError::CollaboratorTimeout) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Core(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Core(CoreError::InvalidCoordinate { .. }) | ApiError::InvalidCoordinate(_) => {
                "invalid_coordinate"
            }
            ApiError::Core(CoreError::CollaboratorUnavailable(_)) => "store_unavailable",
            ApiError::Core(CoreError::CollaboratorTimeout) => "store_timeout",
            ApiError::Core(_) | ApiError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let body = ErrorBody {
            error: self.to_string(),
            status: self.error_type(),
        };
        (status, Json(body)).into_response()
    }
}

/// Failure before the server is ready
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Startup failed: {0}")]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
