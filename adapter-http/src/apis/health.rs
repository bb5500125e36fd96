use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ServerState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
    pub handler: String,
    pub time: DateTime<Utc>,
}

/// GET /health
pub async fn handle_health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let sessions = state.sessions();
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: sessions.session_count(),
        max_sessions: sessions.config().max_sessions,
        handler: state.router.handler_name().to_string(),
        time: Utc::now(),
    })
}
