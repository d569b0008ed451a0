//! HTTP error responses.

use crate::domain::error::{CubeError, ErrorKind};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

/// Error returned by handlers; wraps the crate error and picks the status
#[derive(Debug)]
pub struct ApiError(pub CubeError);

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Status reason, e.g. "Not Found"
    pub error: String,
    /// Error kind, e.g. "not_found"
    pub code: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CubeError> for ApiError {
    fn from(err: CubeError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CubeError::invalid_request(format!("invalid request body: {}", rejection.body_text())))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.0.kind();
        let message = self.0.to_string();

        if status.is_server_error() {
            error!(error_code = %code, message = %message, "API error");
        } else {
            debug!(error_code = %code, message = %message, "Client error");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code,
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
