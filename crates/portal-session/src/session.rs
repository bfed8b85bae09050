//! Session types: the proxy's record of one connected player.
//!
//! A session tracks:
//! - WHO the player is (`PlayerId`, display name)
//! - WHERE they are (the server they are active on, if any)
//! - WHETHER they are parked in hibernation
//! - their last reported latency, forwarded to backends

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use portal_protocol::PlayerId;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session currently stands.
///
/// ```text
///                 ┌────── transfer ok ──────┐
///                 ▼                         │
///   Unassigned ─► Active(server) ─► Transferring(to) ─► Active(to)
///        │              │                 │
///        │              ▼                 ▼ (failure)
///        └─────────► Hibernating ◄────────┘
///                       │
///                       └─ drain ─► Transferring(to)
///
///   any state ──(player leaves)──► Disconnected
/// ```
///
/// `Hibernating` holds exactly for the sessions inside the
/// [`HibernationCoordinator`](crate::HibernationCoordinator)'s set; only
/// the coordinator moves sessions in and out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected to the proxy, not yet placed on a server.
    Unassigned,
    /// Playing on the named server.
    Active { server: String },
    /// No server reachable; waiting for one to register.
    Hibernating,
    /// A transfer to the named server is in flight.
    Transferring { to: String },
    /// The player left the proxy. Terminal.
    Disconnected,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single connected player.
///
/// Shared as `Arc<Session>` between the session store, the routing layer,
/// and the hibernation set. State lives behind a small mutex that is never
/// held across an `.await`.
#[derive(Debug)]
pub struct Session {
    id: PlayerId,
    name: String,
    state: Mutex<SessionState>,
    latency_ms: AtomicU32,
}

impl Session {
    /// Creates an unassigned session.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: Mutex::new(SessionState::Unassigned),
            latency_ms: AtomicU32::new(0),
        }
    }

    /// Returns the player's id.
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Returns the player's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    /// The server this session is active on, if any.
    pub fn server(&self) -> Option<String> {
        match &*self.lock() {
            SessionState::Active { server } => Some(server.clone()),
            _ => None,
        }
    }

    /// Returns `true` if the session is active on `server`.
    pub fn is_on(&self, server: &str) -> bool {
        matches!(&*self.lock(), SessionState::Active { server: s } if s == server)
    }

    /// Returns `true` while the session waits for a server.
    pub fn is_hibernating(&self) -> bool {
        matches!(&*self.lock(), SessionState::Hibernating)
    }

    /// Returns `true` once the player has left.
    pub fn is_disconnected(&self) -> bool {
        matches!(&*self.lock(), SessionState::Disconnected)
    }

    /// Last latency reported by the player-facing connection.
    pub fn latency_ms(&self) -> u32 {
        self.latency_ms.load(Ordering::Relaxed)
    }

    /// Records the player's latency. Called by the player-facing proxy.
    pub fn set_latency_ms(&self, latency_ms: u32) {
        self.latency_ms.store(latency_ms, Ordering::Relaxed);
    }

    /// Runs `f` with the state locked. Crate-internal so that every
    /// transition goes through the hibernation coordinator.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unassigned() {
        let session = Session::new(PlayerId(1), "Steve");

        assert_eq!(session.state(), SessionState::Unassigned);
        assert_eq!(session.server(), None);
        assert!(!session.is_hibernating());
        assert_eq!(session.name(), "Steve");
    }

    #[test]
    fn test_server_reports_only_active_assignment() {
        let session = Session::new(PlayerId(1), "Steve");

        session.update(|s| *s = SessionState::Transferring { to: "lobby".into() });
        assert_eq!(session.server(), None);

        session.update(|s| *s = SessionState::Active { server: "lobby".into() });
        assert_eq!(session.server(), Some("lobby".into()));
        assert!(session.is_on("lobby"));
        assert!(!session.is_on("survival"));
    }

    #[test]
    fn test_latency_defaults_to_zero_and_updates() {
        let session = Session::new(PlayerId(3), "Alex");
        assert_eq!(session.latency_ms(), 0);

        session.set_latency_ms(42);
        assert_eq!(session.latency_ms(), 42);
    }
}
