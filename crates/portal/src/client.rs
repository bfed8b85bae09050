//! The backend side of the control plane.
//!
//! A backend game server uses [`SocketClient`] to authenticate with the
//! proxy, register itself, and exchange packets afterwards.

use portal_protocol::{
    AuthRequest, AuthStatus, ClientType, Packet, RegisterServer, UnregisterServer,
    PROTOCOL_VERSION,
};
use portal_transport::{Connection, ConnectionId, FrameConfig, TcpConnection};

use crate::{HandshakeError, PortalError};

/// A control-plane connection from a backend to the proxy.
pub struct SocketClient {
    conn: TcpConnection,
}

impl SocketClient {
    /// Connects to the proxy's control-plane address.
    pub async fn connect(addr: &str) -> Result<Self, PortalError> {
        Self::connect_with(addr, FrameConfig::default()).await
    }

    /// Connects with explicit frame limits.
    pub async fn connect_with(addr: &str, config: FrameConfig) -> Result<Self, PortalError> {
        let conn = TcpConnection::connect(addr, config).await?;
        Ok(Self { conn })
    }

    /// Returns the local id of this connection.
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Sends an `AuthRequest` as a server named `name` and waits for the answer.
    ///
    /// A rejection is returned as the status, not as an error; the proxy
    /// closes the connection right after it.
    pub async fn authenticate(
        &self,
        secret: &str,
        name: &str,
    ) -> Result<AuthStatus, PortalError> {
        self.send(AuthRequest {
            protocol: PROTOCOL_VERSION,
            client_type: ClientType::Server.to_u8(),
            secret: secret.to_string(),
            name: name.to_string(),
        })
        .await?;

        match self.recv().await? {
            Some(Packet::AuthResponse(response)) => Ok(response.status),
            Some(other) => Err(PortalError::UnexpectedPacket(other.id())),
            None => Err(HandshakeError::Closed.into()),
        }
    }

    /// Registers this backend under its authenticated name.
    pub async fn register_server(&self, address: &str) -> Result<(), PortalError> {
        self.send(RegisterServer {
            address: address.to_string(),
        })
        .await
    }

    /// Removes this backend's registration.
    pub async fn unregister_server(&self) -> Result<(), PortalError> {
        self.send(UnregisterServer).await
    }

    /// Sends any packet.
    pub async fn send(&self, packet: impl Into<Packet>) -> Result<(), PortalError> {
        self.conn.send(&packet.into().to_frame()).await?;
        Ok(())
    }

    /// Receives the next packet. `Ok(None)` once the proxy has closed.
    pub async fn recv(&self) -> Result<Option<Packet>, PortalError> {
        match self.conn.recv().await? {
            Some(frame) => Ok(Some(Packet::from_frame(&frame)?)),
            None => Ok(None),
        }
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), PortalError> {
        self.conn.close().await?;
        Ok(())
    }
}
