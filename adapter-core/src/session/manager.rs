use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Session, SessionId, SessionRegistry, SessionSnapshot, SessionState, Touch};
use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;

/// Configuration for the session manager
#[derive(Clone, Debug)]
pub struct SessionManagerConfig {
    /// Maximum number of concurrent live sessions (None = unlimited)
    pub max_sessions: Option<usize>,
    /// Inactivity window after which a session expires
    pub ttl: Duration,
    /// How often the background sweeper runs
    pub sweep_interval: Duration,
    /// How long terminal sessions are remembered before being purged
    pub tombstone_retention: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: Some(100),
            ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            tombstone_retention: Duration::from_secs(10 * 60),
        }
    }
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions moved from `Active` to `Expired`
    pub expired: usize,
    /// Tombstones dropped from the registry
    pub purged: usize,
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Session manager - sole authority over session creation, validation and termination
pub struct SessionManager {
    registry: SessionRegistry,
    clock: Arc<dyn Clock>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(config: SessionManagerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionManagerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: SessionRegistry::new(config.max_sessions),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create and register a new active session
    /// Capacity is claimed before the record exists, so a rejected creation leaves nothing behind
    pub fn create_session(&self) -> Result<SessionId, SessionError> {
        if let Err(e) = self.registry.reserve_slot() {
            warn!("[] - [] Session creation rejected: {}", e);
            return Err(e);
        }

        let now = self.clock.now();
        loop {
            let session_id = Uuid::new_v4().to_string();
            let session = Arc::new(Session::new(session_id.clone(), now));
            if self.registry.insert_new(session).is_ok() {
                info!("[] - [{}] Created new session", session_id);
                return Ok(session_id);
            }
            warn!("[] - [{}] Session id collision, regenerating", session_id);
        }
    }

    /// Validate a session and record activity on it
    pub async fn touch(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let session = self
            .registry
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        match session.touch(self.clock.now(), to_chrono(self.config.ttl)).await {
            Touch::Active(snapshot) => Ok(snapshot),
            Touch::Lapsed => {
                self.registry.release_slot();
                info!("[] - [{}] Session expired (idle past ttl)", session_id);
                Err(SessionError::Expired(session_id.to_string()))
            }
            Touch::Ended(state) => Err(terminal_error(state, session_id)),
        }
    }

    /// End a session; ending an already terminal session is a no-op
    pub async fn expire(&self, session_id: &str) -> Result<(), SessionError> {
        self.end(session_id, SessionState::Expired).await
    }

    /// Administrative termination
    pub async fn revoke(&self, session_id: &str) -> Result<(), SessionError> {
        self.end(session_id, SessionState::Revoked).await
    }

    async fn end(&self, session_id: &str, target: SessionState) -> Result<(), SessionError> {
        let session = self
            .registry
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.end(target, self.clock.now()).await {
            self.registry.release_slot();
            info!("[] - [{}] Session ended: {:?}", session_id, target);
        } else {
            debug!("[] - [{}] Session already terminal, nothing to do", session_id);
        }
        Ok(())
    }

    /// Look up a session without recording activity
    pub async fn get_session(&self, session_id: &str) -> Option<SessionSnapshot> {
        match self.registry.get(session_id) {
            Some(session) => Some(session.snapshot().await),
            None => None,
        }
    }

    /// Expire every active session idle for longer than `ttl` at `now`, and purge old tombstones
    ///
    /// Entries are copied out first and transitioned one by one, so creations and
    /// validations on other sessions proceed while the pass runs.
    pub async fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> SweepReport {
        let ttl = to_chrono(ttl);
        let retention = to_chrono(self.config.tombstone_retention);
        let mut report = SweepReport::default();

        for session in self.registry.entries() {
            if session.expire_if_idle(now, ttl).await {
                self.registry.release_slot();
                report.expired += 1;
                debug!("[] - [{}] Swept idle session", session.session_id);
            } else if session.is_purgeable(now, retention).await {
                self.registry.remove(&session.session_id);
                report.purged += 1;
            }
        }

        if report.expired > 0 || report.purged > 0 {
            info!(
                "[] - [] Sweep expired {} session(s), purged {} tombstone(s)",
                report.expired, report.purged
            );
        }
        report
    }

    /// Sweep with the configured TTL at the clock's current time
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_expired(self.clock.now(), self.config.ttl).await
    }

    /// Invalidate every live session; sessions do not outlive the process
    pub async fn shutdown(&self) -> usize {
        let now = self.clock.now();
        let mut ended = 0;
        for session in self.registry.entries() {
            if session.end(SessionState::Expired, now).await {
                self.registry.release_slot();
                ended += 1;
            }
        }
        info!("[] - [] Session manager shut down, {} session(s) invalidated", ended);
        ended
    }

    /// Get the number of live sessions
    pub fn session_count(&self) -> usize {
        self.registry.live_count()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

fn terminal_error(state: SessionState, session_id: &str) -> SessionError {
    match state {
        SessionState::Revoked => SessionError::Revoked(session_id.to_string()),
        _ => SessionError::Expired(session_id.to_string()),
    }
}
