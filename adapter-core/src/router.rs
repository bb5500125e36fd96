use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::{CreateSessionResponse, RequestEnvelope, ResponseEnvelope};
use crate::error::{ErrorDescriptor, SessionError};
use crate::handler::{CallContext, Handler};
use crate::session::SessionManager;

/// Gates every inbound call through session validation before dispatch
///
/// Calls on the same session reach the handler in the order they are
/// presented; the router never queues or reorders them.
pub struct RequestRouter {
    sessions: Arc<SessionManager>,
    handler: Arc<dyn Handler>,
}

impl RequestRouter {
    pub fn new(sessions: Arc<SessionManager>, handler: Arc<dyn Handler>) -> Self {
        Self { sessions, handler }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    /// The one call that needs no session
    pub async fn create_session(&self) -> Result<CreateSessionResponse, SessionError> {
        let session_id = self.sessions.create_session()?;
        let created_at = match self.sessions.get_session(&session_id).await {
            Some(snapshot) => snapshot.created_at,
            None => self.sessions.now(),
        };
        Ok(CreateSessionResponse {
            session_id,
            created_at,
            ttl_secs: self.sessions.config().ttl.as_secs(),
        })
    }

    /// Validate the envelope's session, run the handler and wrap its result
    /// Session failures come back as error envelopes, never as a transport failure
    pub async fn dispatch(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let RequestEnvelope {
            request_id,
            session_id,
            payload,
        } = envelope;
        let request_id = if request_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request_id
        };

        let Some(session_id) = session_id else {
            warn!("[{}] - [] Call without session_id", request_id);
            return ResponseEnvelope::error(
                request_id,
                None,
                ErrorDescriptor::invalid_request("session_id is required for calls"),
            );
        };

        let session = match self.sessions.touch(&session_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                info!("[{}] - [{}] Rejected call: {}", request_id, session_id, e);
                return ResponseEnvelope::error(request_id, Some(session_id), e);
            }
        };

        debug!(
            "[{}] - [{}] Dispatching to {} handler",
            request_id,
            session_id,
            self.handler.name()
        );

        let ctx = CallContext {
            request_id: request_id.clone(),
            session,
        };

        match self.handler.handle(&ctx, payload).await {
            Ok(result) => ResponseEnvelope::ok(request_id, Some(session_id), result),
            Err(e) => {
                warn!("[{}] - [{}] Handler failed: {}", request_id, session_id, e);
                ResponseEnvelope::error(request_id, Some(session_id), e)
            }
        }
    }
}
