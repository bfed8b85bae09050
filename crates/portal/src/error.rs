//! Unified error type for Portal.

use portal_protocol::{AuthStatus, DecodeError, PacketId};
use portal_session::{SessionError, TransferError};
use portal_transport::TransportError;

/// Why a backend failed the authentication handshake.
///
/// Every variant ends the connection. The first three are answered with an
/// `AuthResponse` carrying [`status()`](Self::status); the last two close
/// without a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("incorrect secret")]
    IncorrectSecret,

    #[error("unknown client type {0}")]
    UnknownType(u8),

    #[error("invalid handshake data: {0}")]
    InvalidData(String),

    #[error("handshake timed out")]
    TimedOut,

    #[error("connection closed before handshake")]
    Closed,
}

impl HandshakeError {
    /// The status reported to the peer for this failure.
    pub fn status(&self) -> AuthStatus {
        match self {
            HandshakeError::IncorrectSecret => AuthStatus::IncorrectSecret,
            HandshakeError::UnknownType(_) => AuthStatus::UnknownType,
            HandshakeError::InvalidData(_)
            | HandshakeError::TimedOut
            | HandshakeError::Closed => AuthStatus::InvalidData,
        }
    }
}

/// Errors from loading or validating a [`Config`](crate::Config).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// A transport-level error (connect, send, recv, framing).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload that does not decode to a packet.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The peer failed the authentication handshake.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// A session bookkeeping error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A transfer that could not be completed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A packet that is never valid in this direction or at this point.
    #[error("unexpected packet {0:?}")]
    UnexpectedPacket(PacketId),
}
