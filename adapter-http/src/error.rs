use adapter_core::{ErrorKind, SessionError};
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Error response structure for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: String, error_type: String, code: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
                code,
            },
        }
    }

    pub fn invalid_request(message: String) -> Self {
        Self::new(message, "invalid_request".to_string(), None)
    }

    pub fn internal_error(message: String) -> Self {
        Self::new(message, "internal_error".to_string(), None)
    }

    /// Typed session failure; `type` carries the wire error kind
    pub fn session(err: SessionError) -> Self {
        let kind = err.kind();
        Self::new(err.to_string(), kind.as_str().to_string(), None)
    }

    /// Recover the session error kind from the `type` field, if it is one
    pub fn kind(&self) -> Option<ErrorKind> {
        serde_json::from_value(serde_json::Value::String(self.error.r#type.clone())).ok()
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.error.r#type.as_str() {
            "invalid_request" => StatusCode::BAD_REQUEST,
            "session_not_found" => StatusCode::NOT_FOUND,
            "session_expired" | "session_revoked" => StatusCode::GONE,
            "capacity_exceeded" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(err: SessionError) -> Self {
        ErrorResponse::session(err)
    }
}

/// Custom JSON extractor that returns our ErrorResponse on deserialization failures
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ErrorResponse))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        error!("JSON deserialization error: {}", message);
        ErrorResponse::invalid_request(message)
    }
}

/// Failures that stop the server itself
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}
