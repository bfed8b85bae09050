//! Hibernation: parking sessions that have no reachable server.
//!
//! When the routing layer cannot place a player (no server registered, or
//! the transfer failed), the session goes into the hibernation set instead
//! of being disconnected. The player sits on a neutral holding server
//! meanwhile. As soon as a backend registers, the whole set is drained
//! and every parked session is transferred to it.
//!
//! # Drain protocol
//!
//! 1. Lock the set, swap it for an empty one, and mark every swapped-out
//!    session `Transferring` while still holding the lock.
//! 2. Release the lock and transfer the sessions with bounded concurrency.
//! 3. Success → `Active`. Failure → back into the set, where the session
//!    waits for the *next* registration (no immediate retry).
//!
//! A session that starts hibernating during step 2 lands in the fresh set
//! and is picked up by the next drain, so nothing is lost and nothing is
//! transferred twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::stream::{self, StreamExt};
use portal_protocol::PlayerId;
use portal_registry::ServerEntry;
use tokio::task::JoinHandle;

use crate::{Session, SessionError, SessionState, Transferer};

/// Default cap on transfers one drain runs at the same time.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 16;

/// What happened to each session in one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Sessions now active on the drained-to server.
    pub transferred: Vec<PlayerId>,
    /// Sessions whose transfer failed; they are hibernating again.
    pub failed: Vec<PlayerId>,
    /// Sessions that disconnected before or during their transfer.
    pub skipped: Vec<PlayerId>,
}

enum Outcome {
    Transferred,
    Failed,
    Skipped,
}

/// Owns the hibernation set and every state transition in and out of it.
///
/// Built once at startup and shared as `Arc<HibernationCoordinator>`.
///
/// ## Invariant
///
/// A session is in the set if and only if its state is
/// [`SessionState::Hibernating`]. Both are changed together while the set
/// lock is held (lock order: set, then session).
#[derive(Debug)]
pub struct HibernationCoordinator {
    hibernating: Mutex<HashMap<PlayerId, Arc<Session>>>,
    max_concurrent_transfers: usize,
}

impl HibernationCoordinator {
    /// Creates a coordinator whose drains run at most
    /// `max_concurrent_transfers` transfers at once (minimum 1).
    pub fn new(max_concurrent_transfers: usize) -> Self {
        Self {
            hibernating: Mutex::new(HashMap::new()),
            max_concurrent_transfers: max_concurrent_transfers.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlayerId, Arc<Session>>> {
        self.hibernating.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parks a session until a server registers.
    ///
    /// Idempotent for a session that is already hibernating.
    ///
    /// # Errors
    /// - [`SessionError::Closed`]: the player has disconnected
    /// - [`SessionError::TransferInProgress`]: a transfer owns the session;
    ///   its owner decides where it ends up
    pub fn hibernate(&self, session: &Arc<Session>) -> Result<(), SessionError> {
        let mut set = self.lock();
        session.update(|state| match state {
            SessionState::Disconnected => Err(SessionError::Closed(session.id())),
            SessionState::Transferring { .. } => {
                Err(SessionError::TransferInProgress(session.id()))
            }
            _ => {
                *state = SessionState::Hibernating;
                Ok(())
            }
        })?;
        set.insert(session.id(), Arc::clone(session));
        drop(set);

        tracing::info!(player = %session.id(), "session hibernating");
        Ok(())
    }

    /// Hands a claimed session back to the set after its transfer to
    /// `target` failed.
    ///
    /// Only the owner of the `Transferring(target)` claim may do this.
    fn release(&self, session: &Arc<Session>, target: &str) -> Result<(), SessionError> {
        let mut set = self.lock();
        session.update(|state| match state {
            SessionState::Transferring { to } if to == target => {
                *state = SessionState::Hibernating;
                Ok(())
            }
            SessionState::Disconnected => Err(SessionError::Closed(session.id())),
            _ => Err(SessionError::TransferInProgress(session.id())),
        })?;
        set.insert(session.id(), Arc::clone(session));
        drop(set);

        tracing::info!(player = %session.id(), "session hibernating");
        Ok(())
    }

    /// Reserves a session for a transfer to `target`.
    ///
    /// Takes the session out of the set if it was hibernating and marks it
    /// `Transferring`. Returns the state it had before, which
    /// [`abort`](Self::abort) needs if the transfer fails.
    ///
    /// # Errors
    /// - [`SessionError::Closed`]: the player has disconnected
    /// - [`SessionError::TransferInProgress`]: another transfer owns it
    pub fn claim(
        &self,
        session: &Arc<Session>,
        target: &str,
    ) -> Result<SessionState, SessionError> {
        let mut set = self.lock();
        let previous = session.update(|state| match state {
            SessionState::Disconnected => Err(SessionError::Closed(session.id())),
            SessionState::Transferring { .. } => {
                Err(SessionError::TransferInProgress(session.id()))
            }
            _ => Ok(std::mem::replace(
                state,
                SessionState::Transferring {
                    to: target.to_string(),
                },
            )),
        })?;
        set.remove(&session.id());
        Ok(previous)
    }

    /// Finishes a successful transfer: `Transferring(target)` → `Active(target)`.
    ///
    /// Returns `false` (and changes nothing) if the session left the
    /// `Transferring(target)` state meanwhile, e.g. because the player
    /// disconnected.
    pub fn complete(&self, session: &Session, target: &str) -> bool {
        session.update(|state| {
            if !matches!(state, SessionState::Transferring { to } if to == target) {
                return false;
            }
            *state = SessionState::Active {
                server: target.to_string(),
            };
            true
        })
    }

    /// Rolls back a failed transfer to `target`.
    ///
    /// A session that was active on some server stays there; anything else
    /// (unassigned, hibernating) goes back into hibernation.
    pub fn abort(
        &self,
        session: &Arc<Session>,
        target: &str,
        previous: SessionState,
    ) -> Result<(), SessionError> {
        match previous {
            SessionState::Active { server } => session.update(|state| {
                if *state == SessionState::Disconnected {
                    return Err(SessionError::Closed(session.id()));
                }
                *state = SessionState::Active { server };
                Ok(())
            }),
            _ => self.release(session, target),
        }
    }

    /// Marks a session `Disconnected` and drops it from the set.
    pub fn disconnect(&self, session: &Session) {
        let mut set = self.lock();
        session.update(|state| *state = SessionState::Disconnected);
        set.remove(&session.id());
    }

    /// Removes a session from the set without touching its state.
    ///
    /// For callers that already know the session is gone.
    pub fn forget(&self, id: PlayerId) -> Option<Arc<Session>> {
        self.lock().remove(&id)
    }

    /// Atomically empties the set, marking every session `Transferring(target)`.
    pub fn take_all(&self, target: &str) -> Vec<Arc<Session>> {
        let mut set = self.lock();
        let drained = std::mem::take(&mut *set);
        for session in drained.values() {
            session.update(|state| {
                *state = SessionState::Transferring {
                    to: target.to_string(),
                }
            });
        }
        drop(set);
        drained.into_values().collect()
    }

    /// Drains the set to `server` on a new task.
    ///
    /// Returns immediately; the handle resolves to the drain's report.
    /// Transfer failures never surface to the caller.
    pub fn drain_to<T: Transferer>(
        self: &Arc<Self>,
        server: ServerEntry,
        transferer: Arc<T>,
    ) -> JoinHandle<DrainReport> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.drain(&server, &*transferer).await })
    }

    /// Drains the set to `server` on the current task.
    pub async fn drain<T: Transferer>(
        &self,
        server: &ServerEntry,
        transferer: &T,
    ) -> DrainReport {
        let sessions = self.take_all(&server.name);
        if sessions.is_empty() {
            return DrainReport::default();
        }

        tracing::info!(
            server = %server.name,
            count = sessions.len(),
            "transferring hibernating sessions"
        );

        let outcomes: Vec<(PlayerId, Outcome)> = stream::iter(sessions)
            .map(|session| async move {
                let outcome = self.transfer_one(&session, server, transferer).await;
                (session.id(), outcome)
            })
            .buffer_unordered(self.max_concurrent_transfers)
            .collect()
            .await;

        let mut report = DrainReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Outcome::Transferred => report.transferred.push(id),
                Outcome::Failed => report.failed.push(id),
                Outcome::Skipped => report.skipped.push(id),
            }
        }

        tracing::info!(
            server = %server.name,
            transferred = report.transferred.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "drain finished"
        );
        report
    }

    async fn transfer_one<T: Transferer>(
        &self,
        session: &Arc<Session>,
        server: &ServerEntry,
        transferer: &T,
    ) -> Outcome {
        if session.is_disconnected() {
            return Outcome::Skipped;
        }

        match transferer.transfer(session, server).await {
            Ok(()) if self.complete(session, &server.name) => Outcome::Transferred,
            Ok(()) => Outcome::Skipped,
            Err(e) => {
                tracing::warn!(
                    player = %session.id(),
                    server = %server.name,
                    error = %e,
                    "transfer failed, session back to hibernation"
                );
                match self.release(session, &server.name) {
                    Ok(()) => Outcome::Failed,
                    Err(_) => Outcome::Skipped,
                }
            }
        }
    }

    /// Returns `true` if the player's session is hibernating.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Returns the number of hibernating sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no session is hibernating.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for HibernationCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_TRANSFERS)
    }
}
