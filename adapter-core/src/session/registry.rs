use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Session, SessionId};
use crate::error::SessionError;

/// In-memory table of sessions keyed by id
///
/// Backed by a sharded map so lookups on unrelated sessions do not contend.
/// Terminal sessions stay here as tombstones until the sweeper purges them,
/// which is why capacity is tracked with a separate live counter.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    live: AtomicUsize,
    max_sessions: Option<usize>,
}

impl SessionRegistry {
    /// - `max_sessions`: Maximum number of live sessions (None = unlimited)
    pub fn new(max_sessions: Option<usize>) -> Self {
        Self {
            sessions: DashMap::new(),
            live: AtomicUsize::new(0),
            max_sessions,
        }
    }

    /// Claim one live slot, failing when the registry is full
    pub(crate) fn reserve_slot(&self) -> Result<(), SessionError> {
        let max = self.max_sessions;
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| match max {
                Some(max) if live >= max => None,
                _ => Some(live + 1),
            })
            .map(|_| ())
            .map_err(|_| SessionError::CapacityExceeded {
                max: max.unwrap_or(usize::MAX),
            })
    }

    /// Give back a live slot after a session reached a terminal state
    pub(crate) fn release_slot(&self) {
        let _ = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| live.checked_sub(1));
    }

    /// Insert a session under a fresh id; hands the session back if the id is taken
    pub(crate) fn insert_new(&self, session: Arc<Session>) -> Result<(), Arc<Session>> {
        match self.sessions.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Err(session),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    pub(crate) fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    pub(crate) fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    /// Copy out the current entries without holding any shard lock afterwards
    pub(crate) fn entries(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of live (active) sessions
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of records held, tombstones included
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.max_sessions
    }
}
