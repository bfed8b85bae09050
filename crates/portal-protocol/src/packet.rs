//! Control-plane packet definitions.
//!
//! Each packet kind is a plain struct implementing [`PacketBody`], and
//! [`Packet`] is the closed set of all of them. Adding a packet kind means
//! adding a [`PacketId`] variant, a struct, and a [`Packet`] variant; every
//! `match` over `Packet` (decoding, dispatch) then fails to compile until
//! the new kind is handled.

use portal_transport::Frame;

use crate::codec::{decode_body, encode_body, PacketBody, PacketReader, PacketWriter};
use crate::{
    AuthStatus, DecodeError, PlayerId, PlayerLatency, ServerInfo, TransferStatus,
};

/// Version of the control-plane protocol spoken by this crate.
///
/// Sent by backends in `AuthRequest`; a mismatch fails the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// PacketId
// ---------------------------------------------------------------------------

/// The numeric id carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PacketId {
    AuthRequest = 0,
    AuthResponse = 1,
    RegisterServer = 2,
    UnregisterServer = 3,
    TransferRequest = 4,
    TransferResponse = 5,
    ServerListRequest = 6,
    ServerListResponse = 7,
    FindPlayerRequest = 8,
    FindPlayerResponse = 9,
    UpdatePlayerLatency = 10,
}

impl PacketId {
    /// Returns the id as written in the frame header.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for PacketId {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => PacketId::AuthRequest,
            1 => PacketId::AuthResponse,
            2 => PacketId::RegisterServer,
            3 => PacketId::UnregisterServer,
            4 => PacketId::TransferRequest,
            5 => PacketId::TransferResponse,
            6 => PacketId::ServerListRequest,
            7 => PacketId::ServerListResponse,
            8 => PacketId::FindPlayerRequest,
            9 => PacketId::FindPlayerResponse,
            10 => PacketId::UpdatePlayerLatency,
            other => return Err(DecodeError::UnknownPacket(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Backend → proxy: the first packet on every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Must equal [`PROTOCOL_VERSION`].
    pub protocol: u32,
    /// Raw [`ClientType`](crate::ClientType) byte. Kept raw so an unknown
    /// type decodes fine and can be answered with `UnknownType`.
    pub client_type: u8,
    /// The shared control-plane secret.
    pub secret: String,
    /// Display name of the peer; also the name a backend registers under.
    pub name: String,
}

impl PacketBody for AuthRequest {
    const ID: PacketId = PacketId::AuthRequest;

    fn write(&self, w: &mut PacketWriter) {
        w.u32(self.protocol);
        w.u8(self.client_type);
        w.string(&self.secret);
        w.string(&self.name);
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            protocol: r.u32()?,
            client_type: r.u8()?,
            secret: r.string()?,
            name: r.string()?,
        })
    }
}

/// Proxy → backend: the handshake verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: AuthStatus,
}

impl PacketBody for AuthResponse {
    const ID: PacketId = PacketId::AuthResponse;

    fn write(&self, w: &mut PacketWriter) {
        w.u8(self.status.to_u8());
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: AuthStatus::read(r)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Server registration
// ---------------------------------------------------------------------------

/// Backend → proxy: register the peer as a routable server.
///
/// The server name is the peer name from the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterServer {
    /// Address players are sent to, e.g. `"127.0.0.1:19132"`.
    pub address: String,
}

impl PacketBody for RegisterServer {
    const ID: PacketId = PacketId::RegisterServer;

    fn write(&self, w: &mut PacketWriter) {
        w.string(&self.address);
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            address: r.string()?,
        })
    }
}

/// Backend → proxy: withdraw the peer's registration without disconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnregisterServer;

impl PacketBody for UnregisterServer {
    const ID: PacketId = PacketId::UnregisterServer;

    fn write(&self, _w: &mut PacketWriter) {}

    fn read(_r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

// ---------------------------------------------------------------------------
// Player transfer
// ---------------------------------------------------------------------------

/// Backend → proxy: move a player to another registered server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub player: PlayerId,
    pub server: String,
}

impl PacketBody for TransferRequest {
    const ID: PacketId = PacketId::TransferRequest;

    fn write(&self, w: &mut PacketWriter) {
        w.u64(self.player.0);
        w.string(&self.server);
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            player: PlayerId(r.u64()?),
            server: r.string()?,
        })
    }
}

/// Proxy → backend: the result of a [`TransferRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResponse {
    pub player: PlayerId,
    pub status: TransferStatus,
    /// Human-readable failure reason; empty unless `status` is `Error`.
    pub reason: String,
}

impl PacketBody for TransferResponse {
    const ID: PacketId = PacketId::TransferResponse;

    fn write(&self, w: &mut PacketWriter) {
        w.u64(self.player.0);
        w.u8(self.status.to_u8());
        w.string(&self.reason);
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            player: PlayerId(r.u64()?),
            status: TransferStatus::read(r)?,
            reason: r.string()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Backend → proxy: ask for every registered server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerListRequest;

impl PacketBody for ServerListRequest {
    const ID: PacketId = PacketId::ServerListRequest;

    fn write(&self, _w: &mut PacketWriter) {}

    fn read(_r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerListResponse {
    pub servers: Vec<ServerInfo>,
}

impl PacketBody for ServerListResponse {
    const ID: PacketId = PacketId::ServerListResponse;

    fn write(&self, w: &mut PacketWriter) {
        w.count(self.servers.len());
        for server in &self.servers {
            server.write(w);
        }
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let count = r.count()?;
        let mut servers = Vec::new();
        for _ in 0..count {
            servers.push(ServerInfo::read(r)?);
        }
        Ok(Self { servers })
    }
}

/// Backend → proxy: where is this player?
///
/// Looked up by `player` unless it is [`PlayerId::NONE`], in which case
/// `name` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindPlayerRequest {
    pub player: PlayerId,
    pub name: String,
}

impl PacketBody for FindPlayerRequest {
    const ID: PacketId = PacketId::FindPlayerRequest;

    fn write(&self, w: &mut PacketWriter) {
        w.u64(self.player.0);
        w.string(&self.name);
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            player: PlayerId(r.u64()?),
            name: r.string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindPlayerResponse {
    pub player: PlayerId,
    pub name: String,
    pub online: bool,
    /// Current server, empty when offline or not assigned.
    pub server: String,
}

impl PacketBody for FindPlayerResponse {
    const ID: PacketId = PacketId::FindPlayerResponse;

    fn write(&self, w: &mut PacketWriter) {
        w.u64(self.player.0);
        w.string(&self.name);
        w.bool(self.online);
        w.string(&self.server);
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            player: PlayerId(r.u64()?),
            name: r.string()?,
            online: r.bool("online")?,
            server: r.string()?,
        })
    }
}

/// Proxy → backend: latest latency of the players on the backend's server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdatePlayerLatency {
    pub latencies: Vec<PlayerLatency>,
}

impl PacketBody for UpdatePlayerLatency {
    const ID: PacketId = PacketId::UpdatePlayerLatency;

    fn write(&self, w: &mut PacketWriter) {
        w.count(self.latencies.len());
        for entry in &self.latencies {
            entry.write(w);
        }
    }

    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let count = r.count()?;
        let mut latencies = Vec::new();
        for _ in 0..count {
            latencies.push(PlayerLatency::read(r)?);
        }
        Ok(Self { latencies })
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// Any control-plane packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    AuthRequest(AuthRequest),
    AuthResponse(AuthResponse),
    RegisterServer(RegisterServer),
    UnregisterServer(UnregisterServer),
    TransferRequest(TransferRequest),
    TransferResponse(TransferResponse),
    ServerListRequest(ServerListRequest),
    ServerListResponse(ServerListResponse),
    FindPlayerRequest(FindPlayerRequest),
    FindPlayerResponse(FindPlayerResponse),
    UpdatePlayerLatency(UpdatePlayerLatency),
}

impl Packet {
    /// The id this packet is framed under.
    pub fn id(&self) -> PacketId {
        match self {
            Packet::AuthRequest(_) => AuthRequest::ID,
            Packet::AuthResponse(_) => AuthResponse::ID,
            Packet::RegisterServer(_) => RegisterServer::ID,
            Packet::UnregisterServer(_) => UnregisterServer::ID,
            Packet::TransferRequest(_) => TransferRequest::ID,
            Packet::TransferResponse(_) => TransferResponse::ID,
            Packet::ServerListRequest(_) => ServerListRequest::ID,
            Packet::ServerListResponse(_) => ServerListResponse::ID,
            Packet::FindPlayerRequest(_) => FindPlayerRequest::ID,
            Packet::FindPlayerResponse(_) => FindPlayerResponse::ID,
            Packet::UpdatePlayerLatency(_) => UpdatePlayerLatency::ID,
        }
    }

    /// Encodes the packet's payload (without the frame header).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::AuthRequest(p) => encode_body(p),
            Packet::AuthResponse(p) => encode_body(p),
            Packet::RegisterServer(p) => encode_body(p),
            Packet::UnregisterServer(p) => encode_body(p),
            Packet::TransferRequest(p) => encode_body(p),
            Packet::TransferResponse(p) => encode_body(p),
            Packet::ServerListRequest(p) => encode_body(p),
            Packet::ServerListResponse(p) => encode_body(p),
            Packet::FindPlayerRequest(p) => encode_body(p),
            Packet::FindPlayerResponse(p) => encode_body(p),
            Packet::UpdatePlayerLatency(p) => encode_body(p),
        }
    }

    /// Decodes a payload received under the given packet id.
    ///
    /// # Errors
    /// Fails on an unknown id, a truncated payload, trailing bytes, or an
    /// out-of-range field value.
    pub fn decode(id: u32, payload: &[u8]) -> Result<Packet, DecodeError> {
        Ok(match PacketId::try_from(id)? {
            PacketId::AuthRequest => Packet::AuthRequest(decode_body(payload)?),
            PacketId::AuthResponse => Packet::AuthResponse(decode_body(payload)?),
            PacketId::RegisterServer => Packet::RegisterServer(decode_body(payload)?),
            PacketId::UnregisterServer => {
                Packet::UnregisterServer(decode_body(payload)?)
            }
            PacketId::TransferRequest => Packet::TransferRequest(decode_body(payload)?),
            PacketId::TransferResponse => {
                Packet::TransferResponse(decode_body(payload)?)
            }
            PacketId::ServerListRequest => {
                Packet::ServerListRequest(decode_body(payload)?)
            }
            PacketId::ServerListResponse => {
                Packet::ServerListResponse(decode_body(payload)?)
            }
            PacketId::FindPlayerRequest => {
                Packet::FindPlayerRequest(decode_body(payload)?)
            }
            PacketId::FindPlayerResponse => {
                Packet::FindPlayerResponse(decode_body(payload)?)
            }
            PacketId::UpdatePlayerLatency => {
                Packet::UpdatePlayerLatency(decode_body(payload)?)
            }
        })
    }

    /// Wraps the encoded packet in a transport frame.
    pub fn to_frame(&self) -> Frame {
        Frame::new(self.id().as_u32(), self.encode())
    }

    /// Decodes the packet carried by a transport frame.
    pub fn from_frame(frame: &Frame) -> Result<Packet, DecodeError> {
        Packet::decode(frame.packet_id, &frame.payload)
    }
}

impl From<AuthRequest> for Packet {
    fn from(p: AuthRequest) -> Self {
        Packet::AuthRequest(p)
    }
}

impl From<AuthResponse> for Packet {
    fn from(p: AuthResponse) -> Self {
        Packet::AuthResponse(p)
    }
}

impl From<RegisterServer> for Packet {
    fn from(p: RegisterServer) -> Self {
        Packet::RegisterServer(p)
    }
}

impl From<UnregisterServer> for Packet {
    fn from(p: UnregisterServer) -> Self {
        Packet::UnregisterServer(p)
    }
}

impl From<TransferRequest> for Packet {
    fn from(p: TransferRequest) -> Self {
        Packet::TransferRequest(p)
    }
}

impl From<TransferResponse> for Packet {
    fn from(p: TransferResponse) -> Self {
        Packet::TransferResponse(p)
    }
}

impl From<ServerListRequest> for Packet {
    fn from(p: ServerListRequest) -> Self {
        Packet::ServerListRequest(p)
    }
}

impl From<ServerListResponse> for Packet {
    fn from(p: ServerListResponse) -> Self {
        Packet::ServerListResponse(p)
    }
}

impl From<FindPlayerRequest> for Packet {
    fn from(p: FindPlayerRequest) -> Self {
        Packet::FindPlayerRequest(p)
    }
}

impl From<FindPlayerResponse> for Packet {
    fn from(p: FindPlayerResponse) -> Self {
        Packet::FindPlayerResponse(p)
    }
}

impl From<UpdatePlayerLatency> for Packet {
    fn from(p: UpdatePlayerLatency) -> Self {
        Packet::UpdatePlayerLatency(p)
    }
}

// =========================================================================
// Tests
// =========================================================================
