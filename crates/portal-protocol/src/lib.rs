//! Wire protocol for the Portal control plane.
//!
//! This crate defines the "language" the proxy and its backend servers
//! speak over their private socket:
//!
//! - **Packets** ([`Packet`], [`PacketId`], one struct per kind): the
//!   closed set of control-plane messages.
//! - **Codec** ([`PacketWriter`], [`PacketReader`], [`PacketBody`]):
//!   fixed-width little-endian field encoding.
//! - **Errors** ([`DecodeError`]): everything that can go wrong while
//!   turning bytes back into a packet.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Packet) → Socket server (handlers)
//! ```
//!
//! The protocol layer knows nothing about connections or the registry. It
//! only maps a frame's packet id and payload to a typed packet and back.

mod codec;
mod error;
mod packet;
mod types;

pub use codec::{decode_body, encode_body, PacketBody, PacketReader, PacketWriter};
pub use error::DecodeError;
pub use packet::{
    AuthRequest, AuthResponse, FindPlayerRequest, FindPlayerResponse, Packet,
    PacketId, RegisterServer, ServerListRequest, ServerListResponse,
    TransferRequest, TransferResponse, UnregisterServer, UpdatePlayerLatency,
    PROTOCOL_VERSION,
};
pub use types::{AuthStatus, ClientType, PlayerId, PlayerLatency, ServerInfo, TransferStatus};
