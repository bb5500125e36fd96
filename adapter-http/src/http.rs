use adapter_core::{Handler, RequestRouter, SessionManager, SessionManagerConfig, Sweeper};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::apis;
use crate::error::ServerError;

/// Configuration for the HTTP server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0:50051")
    pub address: String,
    /// Session manager configuration
    pub session_manager: SessionManagerConfig,
}

impl ServerConfig {
    /// Create a new server config with the given address and default session manager config
    pub fn new(address: String) -> Self {
        Self {
            address,
            session_manager: SessionManagerConfig::default(),
        }
    }

    /// Set the maximum number of concurrent sessions
    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.session_manager.max_sessions = max_sessions;
        self
    }

    /// Set the inactivity window after which sessions expire
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.session_manager.ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.session_manager.sweep_interval = interval;
        self
    }

    pub fn with_tombstone_retention(mut self, retention: Duration) -> Self {
        self.session_manager.tombstone_retention = retention;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0:50051".to_string())
    }
}

/// Server state holding the request router
#[derive(Clone)]
pub struct ServerState {
    pub router: Arc<RequestRouter>,
}

impl ServerState {
    pub fn new(sessions: Arc<SessionManager>, handler: Arc<dyn Handler>) -> Self {
        Self {
            router: Arc::new(RequestRouter::new(sessions, handler)),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        self.router.sessions()
    }
}

/// All adapter routes
pub fn build_app(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(apis::health::handle_health))
        // Session lifecycle
        .route("/v1/sessions", post(apis::sessions::handle_create_session))
        .route(
            "/v1/sessions/{session_id}",
            get(apis::sessions::handle_get_session).delete(apis::sessions::handle_end_session),
        )
        .route(
            "/v1/sessions/{session_id}/revoke",
            post(apis::sessions::handle_revoke_session),
        )
        // Session-scoped calls
        .route("/v1/call", post(apis::call::handle_call))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the adapter service and run until `shutdown` resolves
///
/// On shutdown the sweeper is stopped and every live session is invalidated.
pub async fn start_server<F>(
    config: ServerConfig,
    handler: Arc<dyn Handler>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sessions = Arc::new(SessionManager::new(config.session_manager.clone()));
    let sweeper = Sweeper::spawn(sessions.clone(), config.session_manager.sweep_interval);

    info!(
        "Session manager initialized: max_sessions={}, ttl={:?}, sweep_interval={:?}",
        config
            .session_manager
            .max_sessions
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unlimited".to_string()),
        config.session_manager.ttl,
        config.session_manager.sweep_interval,
    );

    let state = ServerState::new(sessions.clone(), handler);
    info!("Using {} handler", state.router.handler_name());
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .map_err(|source| ServerError::Bind {
            address: config.address.clone(),
            source,
        })?;

    info!("Codex adapter listening on {}", config.address);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    sweeper.shutdown().await;
    sessions.shutdown().await;
    info!("Codex adapter stopped");

    served.map_err(ServerError::from)
}
