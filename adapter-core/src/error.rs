use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the session lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session expired: {0}")]
    Expired(String),

    #[error("Session revoked: {0}")]
    Revoked(String),

    #[error("Maximum number of sessions reached: {max}")]
    CapacityExceeded { max: usize },
}

impl SessionError {
    /// Whether the client may recover by creating a fresh session and retrying
    pub fn is_session_invalid(&self) -> bool {
        !matches!(self, SessionError::CapacityExceeded { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotFound(_) => ErrorKind::SessionNotFound,
            SessionError::Expired(_) => ErrorKind::SessionExpired,
            SessionError::Revoked(_) => ErrorKind::SessionRevoked,
            SessionError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
        }
    }
}

/// Failure reported by handler logic behind the router
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution error: {0}")]
    Execution(String),
}

/// Error kinds carried on the wire inside a response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SessionNotFound,
    SessionExpired,
    SessionRevoked,
    CapacityExceeded,
    InvalidRequest,
    HandlerFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SessionNotFound => "session_not_found",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::SessionRevoked => "session_revoked",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::HandlerFailed => "handler_failed",
        }
    }

    /// The session behind the call is gone; a new one must be created
    pub fn is_session_invalid(&self) -> bool {
        matches!(
            self,
            ErrorKind::SessionNotFound | ErrorKind::SessionExpired | ErrorKind::SessionRevoked
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.is_session_invalid() || matches!(self, ErrorKind::CapacityExceeded)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error descriptor returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }
}

impl From<SessionError> for ErrorDescriptor {
    fn from(err: SessionError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<HandlerError> for ErrorDescriptor {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::InvalidPayload(msg) => Self::new(ErrorKind::InvalidRequest, msg),
            other => Self::new(ErrorKind::HandlerFailed, other.to_string()),
        }
    }
}
