use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::envelope::{CreateSessionResponse, Payload, RequestEnvelope, ResponseEnvelope};
use crate::error::{ErrorDescriptor, ErrorKind};
use crate::router::RequestRouter;
use crate::session::SessionId;

/// Errors seen by callers of the client session handle
#[derive(Debug, Error)]
pub enum ClientError {
    /// Typed error reported by the adapter
    #[error("{0}")]
    Remote(ErrorDescriptor),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response {got} does not match request {expected}")]
    Uncorrelated { expected: String, got: String },
}

impl ClientError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Remote(e) => Some(e.kind),
            _ => None,
        }
    }

    fn is_session_invalid(&self) -> bool {
        self.kind().is_some_and(|k| k.is_session_invalid())
    }
}

impl From<ErrorDescriptor> for ClientError {
    fn from(e: ErrorDescriptor) -> Self {
        ClientError::Remote(e)
    }
}

/// Wire-level access to an adapter service
#[async_trait]
pub trait Transport: Send + Sync {
    async fn create_session(&self) -> Result<CreateSessionResponse, ClientError>;

    async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope, ClientError>;

    async fn end_session(&self, session_id: &str) -> Result<(), ClientError>;
}

/// Transport that calls a router in the same process
#[derive(Clone)]
pub struct LocalTransport {
    router: Arc<RequestRouter>,
}

impl LocalTransport {
    pub fn new(router: Arc<RequestRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn create_session(&self) -> Result<CreateSessionResponse, ClientError> {
        self.router
            .create_session()
            .await
            .map_err(|e| ClientError::Remote(e.into()))
    }

    async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope, ClientError> {
        Ok(self.router.dispatch(envelope).await)
    }

    async fn end_session(&self, session_id: &str) -> Result<(), ClientError> {
        self.router
            .sessions()
            .expire(session_id)
            .await
            .map_err(|e| ClientError::Remote(e.into()))
    }
}

/// Client-side session holder
///
/// Acquires a session id on first use, attaches it to every call, and when the
/// adapter reports the session invalid, creates a new one and retries once.
pub struct SessionHandle<T: Transport> {
    transport: T,
    session_id: Mutex<Option<SessionId>>,
}

impl<T: Transport> SessionHandle<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session_id: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Currently cached session id, if any
    pub async fn session_id(&self) -> Option<SessionId> {
        self.session_id.lock().await.clone()
    }

    /// Return the cached session id, creating a session when there is none
    pub async fn ensure_session(&self) -> Result<SessionId, ClientError> {
        let mut cached = self.session_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let created = self.transport.create_session().await?;
        info!("[] - [{}] Acquired session", created.session_id);
        *cached = Some(created.session_id.clone());
        Ok(created.session_id)
    }

    /// Send a payload on the session, recovering once from an invalid session
    pub async fn call(&self, payload: Payload) -> Result<Payload, ClientError> {
        let session_id = self.ensure_session().await?;
        match self.send_once(&session_id, payload.clone()).await {
            Err(e) if e.is_session_invalid() => {
                debug!("[] - [{}] Session invalid ({}), re-creating", session_id, e);
                let session_id = self.ensure_session().await?;
                self.send_once(&session_id, payload).await
            }
            other => other,
        }
    }

    async fn send_once(&self, session_id: &str, payload: Payload) -> Result<Payload, ClientError> {
        let request = RequestEnvelope::new(session_id, payload);
        let expected = request.request_id.clone();
        let response = self.transport.send(request).await?;

        if response.request_id != expected {
            return Err(ClientError::Uncorrelated {
                expected,
                got: response.request_id,
            });
        }

        let result = response.into_result().map_err(ClientError::from);
        if let Err(e) = &result {
            if e.is_session_invalid() {
                self.forget(session_id).await;
            }
        }
        result
    }

    /// Drop the cached id if it is still the one that failed
    async fn forget(&self, session_id: &str) {
        let mut cached = self.session_id.lock().await;
        if cached.as_deref() == Some(session_id) {
            *cached = None;
        }
    }

    /// End the cached session on the adapter and clear it locally
    pub async fn close(&self) -> Result<(), ClientError> {
        let taken = self.session_id.lock().await.take();
        match taken {
            Some(id) => self.transport.end_session(&id).await,
            None => Ok(()),
        }
    }
}
