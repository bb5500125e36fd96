use adapter_core::{RequestEnvelope, ResponseEnvelope};
use axum::{extract::State, Json};
use tracing::info;

use crate::{ApiJson, ServerState};

/// POST /v1/call - Session-scoped call
/// Always answers 200; session and handler failures travel inside the envelope
pub async fn handle_call(
    State(state): State<ServerState>,
    ApiJson(envelope): ApiJson<RequestEnvelope>,
) -> Json<ResponseEnvelope> {
    info!(
        "[{}] - [{}] POST /v1/call",
        envelope.request_id,
        envelope.session_id.as_deref().unwrap_or_default()
    );

    // If the client goes away mid-call this future is dropped; the activity
    // already recorded on the session stays recorded.
    Json(state.router.dispatch(envelope).await)
}
