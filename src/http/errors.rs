//! HTTP error handling and conversion

use crate::core::service::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// HTTP error types
#[derive(Debug, Clone)]
pub enum HttpError {
    /// Malformed coordinate or request
    BadRequest(String),

    /// Not found errors
    NotFound(String),

    /// Conflict errors
    Conflict(String),

    /// Backing store could not be reached
    ServiceUnavailable(String),

    /// Backing store did not answer in time
    GatewayTimeout(String),

    /// Server errors
    InternalServerError(String),
}

impl HttpError {
    /// Convert to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Conflict(_) => StatusCode::CONFLICT,
            HttpError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            HttpError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            HttpError::BadRequest(_) => "BAD_REQUEST",
            HttpError::NotFound(_) => "NOT_FOUND",
            HttpError::Conflict(_) => "CONFLICT",
            HttpError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            HttpError::GatewayTimeout(_) => "UPSTREAM_TIMEOUT",
            HttpError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            HttpError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            HttpError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            HttpError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            HttpError::GatewayTimeout(msg) => write!(f, "Gateway Timeout: {}", msg),
            HttpError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            error!("{}", self);
        }

        let message = match self {
            HttpError::BadRequest(msg)
            | HttpError::NotFound(msg)
            | HttpError::Conflict(msg)
            | HttpError::ServiceUnavailable(msg)
            | HttpError::GatewayTimeout(msg)
            | HttpError::InternalServerError(msg) => msg,
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
                "details": null
            }
        }));

        (status, body).into_response()
    }
}

/// Convert service errors to HTTP errors
impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCoordinate(_)
            | ServiceError::ManifestInvalid { .. }
            | ServiceError::ManifestNotFound(_)
            | ServiceError::ManifestParse(_)
            | ServiceError::DirectoryNotFound(_) => HttpError::BadRequest(err.to_string()),
            ServiceError::NotFound(msg) => HttpError::NotFound(msg),
            ServiceError::ObjectConflict(key) => {
                HttpError::Conflict(format!("{} is already published", key))
            }
            ServiceError::StorageUnavailable(msg) => HttpError::ServiceUnavailable(msg),
            ServiceError::UpstreamTimeout(_) => HttpError::GatewayTimeout(err.to_string()),
            ServiceError::ArchiveIo(_)
            | ServiceError::Storage(_)
            | ServiceError::Config(_)
            | ServiceError::Io(_) => HttpError::InternalServerError(err.to_string()),
        }
    }
}

/// Result type alias for HTTP operations
pub type HttpResult<T> = Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_service_error_status_mapping() {
        let cases = [
            (
                ServiceError::InvalidCoordinate("bad ns".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::NotFound("a/b/c@1.0.0".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::ObjectConflict("a/b/c/a-b-c-1.0.0.tar.gz".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::StorageUnavailable("down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServiceError::UpstreamTimeout(Duration::from_secs(30)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ServiceError::Storage("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status_code(), expected);
        }
    }
}
