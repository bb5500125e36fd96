use adapter_core::{
    ClientError, CreateSessionResponse, ErrorDescriptor, RequestEnvelope, ResponseEnvelope,
    SessionHandle, Transport,
};
use async_trait::async_trait;
use reqwest::Response;
use tracing::debug;

use crate::ErrorResponse;

fn transport_error(e: reqwest::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

/// Transport speaking the adapter's HTTP/JSON protocol
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// - `base_url`: adapter root, e.g. `http://localhost:50051`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Wrap in a session handle
    pub fn into_handle(self) -> SessionHandle<Self> {
        SessionHandle::new(self)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-success HTTP reply into a typed error when the body carries one
async fn error_from(response: Response) -> ClientError {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => match body.kind() {
            Some(kind) => ClientError::Remote(ErrorDescriptor::new(kind, body.error.message)),
            None => ClientError::Transport(format!("HTTP {}: {}", status, body.error.message)),
        },
        Err(_) => ClientError::Transport(format!("HTTP {}", status)),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn create_session(&self) -> Result<CreateSessionResponse, ClientError> {
        let response = self
            .client
            .post(self.url("/v1/sessions"))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        response.json().await.map_err(transport_error)
    }

    async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope, ClientError> {
        debug!(
            "[{}] - [{}] Sending call",
            envelope.request_id,
            envelope.session_id.as_deref().unwrap_or_default()
        );
        let response = self
            .client
            .post(self.url("/v1/call"))
            .json(&envelope)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        response.json().await.map_err(transport_error)
    }

    async fn end_session(&self, session_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/v1/sessions/{}", session_id)))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        Ok(())
    }
}
