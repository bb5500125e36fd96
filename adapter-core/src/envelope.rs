use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorDescriptor;
use crate::session::SessionId;

pub const PAYLOAD_SCHEMA_VERSION: u32 = 1;

/// Opaque handler payload with the schema version it was written against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub data: Value,
}

fn default_schema_version() -> u32 {
    PAYLOAD_SCHEMA_VERSION
}

impl Payload {
    pub fn new(data: Value) -> Self {
        Self {
            schema_version: PAYLOAD_SCHEMA_VERSION,
            data,
        }
    }
}

/// Inbound call: a payload plus the session it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub payload: Payload,
}

impl RequestEnvelope {
    pub fn new(session_id: impl Into<SessionId>, payload: Payload) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            session_id: Some(session_id.into()),
            payload,
        }
    }
}

/// Result half of a response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok { payload: Payload },
    Error { error: ErrorDescriptor },
}

/// Reply to exactly one request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    pub fn ok(request_id: String, session_id: Option<SessionId>, payload: Payload) -> Self {
        Self {
            request_id,
            session_id,
            outcome: Outcome::Ok { payload },
        }
    }

    pub fn error(
        request_id: String,
        session_id: Option<SessionId>,
        error: impl Into<ErrorDescriptor>,
    ) -> Self {
        Self {
            request_id,
            session_id,
            outcome: Outcome::Error {
                error: error.into(),
            },
        }
    }

    pub fn into_result(self) -> Result<Payload, ErrorDescriptor> {
        match self.outcome {
            Outcome::Ok { payload } => Ok(payload),
            Outcome::Error { error } => Err(error),
        }
    }
}

/// Reply to a session creation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}
