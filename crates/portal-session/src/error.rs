//! Error types for the session layer.

use portal_protocol::PlayerId;

/// Errors from session bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// A session for this player already exists in the store.
    #[error("player {0} already has a session")]
    AlreadyExists(PlayerId),

    /// The player has disconnected; the session can no longer change state.
    #[error("session for player {0} is closed")]
    Closed(PlayerId),

    /// Another transfer of this session is already running.
    #[error("player {0} is already being transferred")]
    TransferInProgress(PlayerId),
}

/// Failure of a single transfer attempt.
///
/// Always scoped to one session. During a drain it sends that session back
/// into hibernation and never aborts the transfers of other sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The target server could not be reached by the player connection.
    #[error("server {server} unreachable: {reason}")]
    Unreachable { server: String, reason: String },

    /// The player-facing side refused the transfer.
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// The session changed state underneath the transfer.
    #[error(transparent)]
    Session(#[from] SessionError),
}
