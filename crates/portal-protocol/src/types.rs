//! Value types carried inside control-plane packets.
//!
//! The enumerations here are single bytes on the wire. Decoding a byte
//! outside the defined range is a [`DecodeError::InvalidValue`], never a
//! silent fallback.

use std::fmt;

use crate::codec::{PacketReader, PacketWriter};
use crate::DecodeError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable identifier for a connected player.
///
/// Assigned by the player-facing side of the proxy when a player connects
/// and used by backend servers to refer to that player in transfer and
/// lookup requests. `PlayerId(0)` is never assigned; requests use it to
/// mean "no id, look up by name instead".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// The placeholder id meaning "not specified".
    pub const NONE: PlayerId = PlayerId(0);

    /// Returns `true` for the placeholder id.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientType
// ---------------------------------------------------------------------------

/// What kind of process is authenticating on the control plane.
///
/// Only backend game servers exist today. The field is on the wire so a
/// peer of an unknown kind gets a clear `UnknownType` answer instead of a
/// generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    /// A backend game server that may register itself and move players.
    Server,
}

impl ClientType {
    /// Returns the wire byte.
    pub fn to_u8(self) -> u8 {
        match self {
            ClientType::Server => 0,
        }
    }

    /// Maps a raw byte to a client type, `None` if it is not defined.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ClientType::Server),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthStatus
// ---------------------------------------------------------------------------

/// Outcome of the authentication handshake, carried by `AuthResponse`.
///
/// Every non-success value is terminal: the proxy closes the connection
/// right after sending it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStatus {
    Success,
    IncorrectSecret,
    UnknownType,
    InvalidData,
}

impl AuthStatus {
    /// Returns the wire byte.
    pub fn to_u8(self) -> u8 {
        match self {
            AuthStatus::Success => 0,
            AuthStatus::IncorrectSecret => 1,
            AuthStatus::UnknownType => 2,
            AuthStatus::InvalidData => 3,
        }
    }

    pub(crate) fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        match r.u8()? {
            0 => Ok(AuthStatus::Success),
            1 => Ok(AuthStatus::IncorrectSecret),
            2 => Ok(AuthStatus::UnknownType),
            3 => Ok(AuthStatus::InvalidData),
            other => Err(DecodeError::InvalidValue {
                field: "auth status",
                value: other as u32,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// TransferStatus
// ---------------------------------------------------------------------------

/// Outcome of a backend-initiated `TransferRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    Success,
    /// No server is registered under the requested name.
    ServerNotFound,
    /// The player is already active on the requested server.
    AlreadyOnServer,
    /// No session exists for the requested player.
    PlayerNotFound,
    /// The transfer was attempted and failed; see the response's reason.
    Error,
}

impl TransferStatus {
    /// Returns the wire byte.
    pub fn to_u8(self) -> u8 {
        match self {
            TransferStatus::Success => 0,
            TransferStatus::ServerNotFound => 1,
            TransferStatus::AlreadyOnServer => 2,
            TransferStatus::PlayerNotFound => 3,
            TransferStatus::Error => 4,
        }
    }

    pub(crate) fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        match r.u8()? {
            0 => Ok(TransferStatus::Success),
            1 => Ok(TransferStatus::ServerNotFound),
            2 => Ok(TransferStatus::AlreadyOnServer),
            3 => Ok(TransferStatus::PlayerNotFound),
            4 => Ok(TransferStatus::Error),
            other => Err(DecodeError::InvalidValue {
                field: "transfer status",
                value: other as u32,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// List entries
// ---------------------------------------------------------------------------

/// One registered server as reported in a `ServerListResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub address: String,
    /// Sessions currently active on this server.
    pub player_count: u32,
}

impl ServerInfo {
    pub(crate) fn write(&self, w: &mut PacketWriter) {
        w.string(&self.name);
        w.string(&self.address);
        w.u32(self.player_count);
    }

    pub(crate) fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: r.string()?,
            address: r.string()?,
            player_count: r.u32()?,
        })
    }
}

/// One player's round-trip latency in an `UpdatePlayerLatency` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLatency {
    pub player: PlayerId,
    pub latency_ms: u32,
}

impl PlayerLatency {
    pub(crate) fn write(&self, w: &mut PacketWriter) {
        w.u64(self.player.0);
        w.u32(self.latency_ms);
    }

    pub(crate) fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            player: PlayerId(r.u64()?),
            latency_ms: r.u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(42).to_string(), "P-42");
    }

    #[test]
    fn test_player_id_none_is_zero() {
        assert!(PlayerId::NONE.is_none());
        assert!(!PlayerId(1).is_none());
    }

    #[test]
    fn test_client_type_unknown_byte_is_none() {
        assert_eq!(ClientType::from_u8(0), Some(ClientType::Server));
        assert_eq!(ClientType::from_u8(1), None);
        assert_eq!(ClientType::from_u8(255), None);
    }

    #[test]
    fn test_auth_status_wire_values_are_stable() {
        assert_eq!(AuthStatus::Success.to_u8(), 0);
        assert_eq!(AuthStatus::IncorrectSecret.to_u8(), 1);
        assert_eq!(AuthStatus::UnknownType.to_u8(), 2);
        assert_eq!(AuthStatus::InvalidData.to_u8(), 3);
    }

    #[test]
    fn test_auth_status_out_of_range_rejected() {
        let mut r = PacketReader::new(&[4]);
        assert_eq!(
            AuthStatus::read(&mut r),
            Err(DecodeError::InvalidValue {
                field: "auth status",
                value: 4
            })
        );
    }

    #[test]
    fn test_transfer_status_out_of_range_rejected() {
        let mut r = PacketReader::new(&[5]);
        assert!(matches!(
            TransferStatus::read(&mut r),
            Err(DecodeError::InvalidValue { value: 5, .. })
        ));
    }
}
