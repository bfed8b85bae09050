//! The routing layer: where a player goes, and what happens when nowhere works.
//!
//! Every placement decision goes through [`Router`]. A player that cannot be
//! placed is hibernated instead of disconnected; the next server that
//! registers picks them up through [`Router::drain_to`].

use std::sync::Arc;

use portal_protocol::PlayerId;
use portal_registry::{ServerEntry, ServerRegistry};
use portal_session::{
    DrainReport, HibernationCoordinator, Session, SessionError, SessionStore,
    TransferError, Transferer,
};
use tokio::task::JoinHandle;

/// Where [`Router::connect`] put a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Active on the named server.
    Routed(String),
    /// No server could take the player; waiting for one to register.
    Hibernated,
}

/// Places sessions on servers.
///
/// Cheap to clone; every clone shares the same registry, store, and
/// hibernation set.
pub struct Router<T: Transferer> {
    registry: Arc<ServerRegistry>,
    sessions: Arc<SessionStore>,
    hibernation: Arc<HibernationCoordinator>,
    transferer: Arc<T>,
}

impl<T: Transferer> Clone for Router<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            sessions: Arc::clone(&self.sessions),
            hibernation: Arc::clone(&self.hibernation),
            transferer: Arc::clone(&self.transferer),
        }
    }
}

impl<T: Transferer> Router<T> {
    /// Creates a router over shared state.
    pub fn new(
        registry: Arc<ServerRegistry>,
        sessions: Arc<SessionStore>,
        hibernation: Arc<HibernationCoordinator>,
        transferer: Arc<T>,
    ) -> Self {
        Self {
            registry,
            sessions,
            hibernation,
            transferer,
        }
    }

    /// Returns the server registry.
    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Returns the session store.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Returns the hibernation coordinator.
    pub fn hibernation(&self) -> &Arc<HibernationCoordinator> {
        &self.hibernation
    }

    /// Returns the transferer.
    pub fn transferer(&self) -> &Arc<T> {
        &self.transferer
    }

    /// Places a newly connected session.
    ///
    /// Tries `preferred` if it is registered, otherwise any registered
    /// server. With no server, or if the transfer fails, the session is
    /// hibernated.
    ///
    /// A session that a transfer or drain already owns is left to that
    /// owner and never hibernated here.
    ///
    /// # Errors
    /// Only session-state errors: the player already disconnected, or
    /// another transfer of the same session is running.
    pub async fn connect(
        &self,
        session: &Arc<Session>,
        preferred: Option<&str>,
    ) -> Result<Route, SessionError> {
        let target = preferred
            .and_then(|name| self.registry.lookup(name))
            .or_else(|| self.registry.any());

        let Some(server) = target else {
            tracing::info!(player = %session.id(), "no server available");
            self.hibernation.hibernate(session)?;
            return Ok(Route::Hibernated);
        };

        match self.transfer(session, &server).await {
            Ok(()) => Ok(Route::Routed(server.name)),
            Err(TransferError::Session(e)) => Err(e),
            Err(_) if session.is_disconnected() => Err(SessionError::Closed(session.id())),
            Err(_) => Ok(match session.server() {
                Some(current) => Route::Routed(current),
                None => Route::Hibernated,
            }),
        }
    }

    /// Moves a session to `server` through the transferer.
    ///
    /// On failure the session is rolled back: it stays on its previous
    /// server if it had one, and is hibernated otherwise.
    pub async fn transfer(
        &self,
        session: &Arc<Session>,
        server: &ServerEntry,
    ) -> Result<(), TransferError> {
        let previous = self.hibernation.claim(session, &server.name)?;

        match self.transferer.transfer(session, server).await {
            Ok(()) => {
                if !self.hibernation.complete(session, &server.name) {
                    return Err(SessionError::Closed(session.id()).into());
                }
                tracing::info!(
                    player = %session.id(),
                    server = %server.name,
                    "player transferred"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    player = %session.id(),
                    server = %server.name,
                    error = %e,
                    "transfer failed"
                );
                if let Err(rollback) = self.hibernation.abort(session, &server.name, previous) {
                    tracing::debug!(player = %session.id(), error = %rollback, "rollback skipped");
                }
                Err(e)
            }
        }
    }

    /// Transfers every hibernating session to `server` on a new task.
    pub fn drain_to(&self, server: ServerEntry) -> JoinHandle<DrainReport> {
        self.hibernation
            .drain_to(server, Arc::clone(&self.transferer))
    }

    /// Ends a player's session: marks it `Disconnected` and drops it from
    /// the store and the hibernation set.
    pub fn disconnect(&self, id: PlayerId) -> Option<Arc<Session>> {
        let session = self.sessions.remove(id)?;
        self.hibernation.disconnect(&session);
        tracing::info!(player = %id, "player disconnected");
        Some(session)
    }
}
