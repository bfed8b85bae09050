//! The session store: every player currently connected to the proxy.
//!
//! The player-facing proxy creates a session when it accepts a player and
//! removes it when the player leaves. The control plane only reads sessions
//! and drives their state through the hibernation coordinator.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use portal_protocol::PlayerId;

use crate::{Session, SessionError};

/// Concurrent map of connected players, keyed by [`PlayerId`].
///
/// Sessions are handed out as `Arc<Session>`, so a caller can keep working
/// with a session after it has been removed; its state will read
/// `Disconnected` once the routing layer has closed it.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<PlayerId, Arc<Session>>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PlayerId, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PlayerId, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a session for a newly accepted player.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyExists`] if the player already has one.
    pub fn create(
        &self,
        id: PlayerId,
        name: &str,
    ) -> Result<Arc<Session>, SessionError> {
        let mut sessions = self.write();
        if sessions.contains_key(&id) {
            return Err(SessionError::AlreadyExists(id));
        }
        let session = Arc::new(Session::new(id, name));
        sessions.insert(id, Arc::clone(&session));
        tracing::debug!(player = %id, name, "session created");
        Ok(session)
    }

    /// Looks up a session by player id.
    pub fn get(&self, id: PlayerId) -> Option<Arc<Session>> {
        self.read().get(&id).cloned()
    }

    /// Looks up a session by display name, ignoring ASCII case.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Session>> {
        self.read()
            .values()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Removes a session from the store and returns it.
    pub fn remove(&self, id: PlayerId) -> Option<Arc<Session>> {
        let removed = self.write().remove(&id);
        if removed.is_some() {
            tracing::debug!(player = %id, "session removed");
        }
        removed
    }

    /// Sessions currently active on `server`.
    pub fn active_on(&self, server: &str) -> Vec<Arc<Session>> {
        self.read()
            .values()
            .filter(|s| s.is_on(server))
            .cloned()
            .collect()
    }

    /// Number of sessions currently active on `server`.
    pub fn count_on(&self, server: &str) -> usize {
        self.read().values().filter(|s| s.is_on(server)).count()
    }

    /// Returns the number of sessions (any state).
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
