use adapter_core::SessionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::info;
use uuid::Uuid;

use crate::{ErrorResponse, ServerState};

/// POST /v1/sessions - Create a new session
pub async fn handle_create_session(
    State(state): State<ServerState>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4();
    info!("[{}] POST /v1/sessions", request_id);

    let created = state.router.create_session().await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// GET /v1/sessions/{session_id} - Session status, does not count as activity
pub async fn handle_get_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4();
    info!("[{}] GET /v1/sessions/{}", request_id, session_id);

    match state.sessions().get_session(&session_id).await {
        Some(snapshot) => Ok(Json(snapshot).into_response()),
        None => Err(SessionError::NotFound(session_id).into()),
    }
}

/// DELETE /v1/sessions/{session_id} - End a session, idempotent
pub async fn handle_end_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4();
    info!("[{}] DELETE /v1/sessions/{}", request_id, session_id);

    state.sessions().expire(&session_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /v1/sessions/{session_id}/revoke - Administrative termination
pub async fn handle_revoke_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4();
    info!("[{}] POST /v1/sessions/{}/revoke", request_id, session_id);

    state.sessions().revoke(&session_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
