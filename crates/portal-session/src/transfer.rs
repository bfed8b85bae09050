//! The transfer hook: how a player is actually moved between servers.
//!
//! Portal's control plane decides *where* a player should go. Moving the
//! player's live connection is the player-facing proxy's job, so it is
//! reached through the [`Transferer`] trait. The proxy implements it with
//! its game-protocol connection; tests implement it with a recorder.

use std::future::Future;

use portal_registry::ServerEntry;

use crate::{Session, TransferError};

/// Redirects a connected player to a backend server.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one transferer is shared by every
///   connection task and drain task for the lifetime of the server.
/// - The returned future is `Send` so drains can run it on spawned tasks.
///
/// Implementations must be safe to call concurrently for different
/// sessions. The session's state is managed by the caller; an
/// implementation only performs the move and reports success or failure.
///
/// # Example
///
/// ```rust
/// use portal_registry::ServerEntry;
/// use portal_session::{Session, TransferError, Transferer};
///
/// /// Logs every transfer and reports success.
/// struct LogTransferer;
///
/// impl Transferer for LogTransferer {
///     async fn transfer(
///         &self,
///         session: &Session,
///         server: &ServerEntry,
///     ) -> Result<(), TransferError> {
///         println!("moving {} to {}", session.name(), server.address);
///         Ok(())
///     }
/// }
/// ```
pub trait Transferer: Send + Sync + 'static {
    /// Moves `session`'s player to `server`.
    ///
    /// # Returns
    /// - `Ok(())`: the player is now connected to `server`
    /// - `Err(TransferError)`: the player is still where they were
    fn transfer(
        &self,
        session: &Session,
        server: &ServerEntry,
    ) -> impl Future<Output = Result<(), TransferError>> + Send;
}
