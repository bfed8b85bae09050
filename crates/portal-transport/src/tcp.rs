//! TCP transport implementation using `tokio::net`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::framing::{read_frame, write_frame};
use crate::{Connection, ConnectionId, Frame, FrameConfig, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// A TCP [`Transport`] that listens for control-plane connections.
pub struct TcpTransport {
    listener: TcpListener,
    config: FrameConfig,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(
        addr: &str,
        config: FrameConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "control-plane transport listening");
        Ok(Self { listener, config })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream, addr, self.config.clone());
        tracing::debug!(id = %conn.id(), %addr, "accepted control-plane connection");
        Ok(conn)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single framed TCP connection.
///
/// The stream is split so a pending `recv` never blocks a concurrent `send`.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    config: FrameConfig,
}

impl TcpConnection {
    /// Opens an outbound connection (the backend-server side).
    pub async fn connect(
        addr: &str,
        config: FrameConfig,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            TransportError::ConnectionClosed(format!("connect to {addr} failed: {e}"))
        })?;
        let peer_addr = stream.peer_addr().map_err(TransportError::ReceiveFailed)?;
        Ok(Self::from_stream(stream, peer_addr, config))
    }

    fn from_stream(
        stream: TcpStream,
        peer_addr: SocketAddr,
        config: FrameConfig,
    ) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "failed to set TCP_NODELAY");
        }
        let (reader, writer) = stream.into_split();
        Self {
            id: next_connection_id(),
            peer_addr,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            config,
        }
    }

    /// Returns the remote address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, frame: &Frame) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, frame, &self.config).await
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut reader = self.reader.lock().await;
        read_frame(&mut *reader, &self.config).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
