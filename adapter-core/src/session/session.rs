use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// Opaque session token handed to clients
pub type SessionId = String;

/// Lifecycle state of a session. `Expired` and `Revoked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Expired,
    Revoked,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Active)
    }
}

/// Point-in-time copy of a session record, safe to hand out of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub request_count: u64,
}

/// Result of recording activity on a session
#[derive(Debug)]
pub(crate) enum Touch {
    /// Session is live and its activity timestamp was refreshed
    Active(SessionSnapshot),
    /// Session was idle past the TTL and has just been expired by this touch
    Lapsed,
    /// Session was already in the given terminal state
    Ended(SessionState),
}

struct SessionInner {
    state: SessionState,
    last_active_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    request_count: u64,
}

/// A single session record owned by the registry
/// All mutable fields sit behind one lock so state and timestamps change together
pub struct Session {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            created_at: now,
            inner: Mutex::new(SessionInner {
                state: SessionState::Active,
                last_active_at: now,
                ended_at: None,
                request_count: 0,
            }),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        self.snapshot_locked(&inner)
    }

    fn snapshot_locked(&self, inner: &SessionInner) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            state: inner.state,
            created_at: self.created_at,
            last_active_at: inner.last_active_at,
            ended_at: inner.ended_at,
            request_count: inner.request_count,
        }
    }

    /// Record activity, expiring the session first if it sat idle longer than `ttl`
    pub(crate) async fn touch(&self, now: DateTime<Utc>, ttl: Duration) -> Touch {
        let mut inner = self.inner.lock().await;
        let state = inner.state;
        match state {
            SessionState::Active if now - inner.last_active_at > ttl => {
                inner.state = SessionState::Expired;
                inner.ended_at = Some(now);
                debug!("[] - [{}] Idle past ttl, expired on access", self.session_id);
                Touch::Lapsed
            }
            SessionState::Active => {
                // Never move the activity mark backwards
                if now > inner.last_active_at {
                    inner.last_active_at = now;
                }
                inner.request_count += 1;
                Touch::Active(self.snapshot_locked(&inner))
            }
            terminal => Touch::Ended(terminal),
        }
    }

    /// Move an active session into a terminal state
    /// Returns false when the session was already terminal (no transition happens)
    pub(crate) async fn end(&self, target: SessionState, now: DateTime<Utc>) -> bool {
        debug_assert!(target.is_terminal());
        let mut inner = self.inner.lock().await;
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = target;
        inner.ended_at = Some(now);
        true
    }

    pub(crate) async fn expire_if_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Active || now - inner.last_active_at <= ttl {
            return false;
        }
        inner.state = SessionState::Expired;
        inner.ended_at = Some(now);
        true
    }

    /// Terminal and ended longer ago than `retention`
    pub(crate) async fn is_purgeable(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        let inner = self.inner.lock().await;
        match inner.ended_at {
            Some(ended) => inner.state.is_terminal() && now - ended > retention,
            None => false,
        }
    }
}
