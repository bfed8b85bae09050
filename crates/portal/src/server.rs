//! `SocketServer` builder and accept loop.
//!
//! This is the entry point for running the control plane. It ties together
//! all the layers: transport → protocol → registry → sessions → routing.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures_util::future::join_all;
use portal_protocol::{ClientType, Packet, PlayerLatency, UpdatePlayerLatency};
use portal_registry::ServerRegistry;
use portal_session::{
    HibernationCoordinator, SessionStore, Transferer, DEFAULT_MAX_CONCURRENT_TRANSFERS,
};
use portal_transport::{Connection, ConnectionId, FrameConfig, TcpConnection, TcpTransport, Transport};
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{Config, PortalError, Router};

/// An authenticated control-plane connection.
pub(crate) struct Peer {
    pub(crate) name: String,
    pub(crate) client_type: ClientType,
    pub(crate) conn: Arc<TcpConnection>,
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<T: Transferer> {
    pub(crate) secret: String,
    pub(crate) handshake_timeout: Duration,
    pub(crate) router: Router<T>,
    peers: RwLock<HashMap<ConnectionId, Peer>>,
}

impl<T: Transferer> ServerState<T> {
    fn peers_read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Peer>> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn peers_write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, Peer>> {
        self.peers.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn registry(&self) -> &ServerRegistry {
        self.router.registry()
    }

    pub(crate) fn add_peer(&self, id: ConnectionId, peer: Peer) {
        self.peers_write().insert(id, peer);
    }

    pub(crate) fn remove_peer(&self, id: ConnectionId) -> Option<Peer> {
        self.peers_write().remove(&id)
    }

    /// Latency packets for every peer that owns at least one server.
    fn latency_reports(&self) -> Vec<(Arc<TcpConnection>, UpdatePlayerLatency)> {
        let peers: Vec<(ConnectionId, Arc<TcpConnection>)> = self
            .peers_read()
            .iter()
            .filter(|(_, peer)| peer.client_type == ClientType::Server)
            .map(|(id, peer)| (*id, Arc::clone(&peer.conn)))
            .collect();

        peers
            .into_iter()
            .filter_map(|(id, conn)| {
                let names = self.registry().names_owned_by(id);
                if names.is_empty() {
                    return None;
                }
                let latencies = names
                    .iter()
                    .flat_map(|name| self.router.sessions().active_on(name))
                    .map(|session| PlayerLatency {
                        player: session.id(),
                        latency_ms: session.latency_ms(),
                    })
                    .collect();
                Some((conn, UpdatePlayerLatency { latencies }))
            })
            .collect()
    }

    /// Sends one round of `UpdatePlayerLatency` packets.
    pub(crate) async fn broadcast_latency(&self) {
        let sends = self.latency_reports().into_iter().map(|(conn, packet)| async move {
            let frame = Packet::from(packet).to_frame();
            if let Err(e) = conn.send(&frame).await {
                tracing::debug!(conn_id = %conn.id(), error = %e, "latency report failed");
            }
        });
        join_all(sends).await;
    }
}

/// Builder for configuring and starting a [`SocketServer`].
///
/// # Example
///
/// ```rust,ignore
/// use portal::prelude::*;
///
/// let server = SocketServer::builder()
///     .bind("0.0.0.0:19132")
///     .secret("hunter2")
///     .build(my_transferer)
///     .await?;
/// server.run().await
/// ```
pub struct SocketServerBuilder {
    bind_addr: String,
    secret: String,
    handshake_timeout: Duration,
    frame_config: FrameConfig,
    max_concurrent_transfers: usize,
    registry: Option<Arc<ServerRegistry>>,
    sessions: Option<Arc<SessionStore>>,
}

impl SocketServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:19132".to_string(),
            secret: String::new(),
            handshake_timeout: Duration::from_secs(5),
            frame_config: FrameConfig::default(),
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            registry: None,
            sessions: None,
        }
    }

    /// Creates a builder from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .bind(&config.communication.address)
            .secret(&config.communication.secret)
            .handshake_timeout(config.handshake_timeout())
            .frame_config(config.frame_config())
            .max_concurrent_transfers(config.max_concurrent_transfers)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the secret backends must present.
    pub fn secret(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Sets how long a new connection may take to authenticate.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the frame limits for accepted connections.
    pub fn frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Caps concurrent transfers while draining hibernation.
    pub fn max_concurrent_transfers(mut self, max: usize) -> Self {
        self.max_concurrent_transfers = max;
        self
    }

    /// Shares an existing registry instead of creating one.
    pub fn registry(mut self, registry: Arc<ServerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Shares the player-facing proxy's session store.
    pub fn sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Binds the listener and builds the server around `transferer`.
    pub async fn build<T: Transferer>(
        self,
        transferer: T,
    ) -> Result<SocketServer<T>, PortalError> {
        let transport = TcpTransport::bind(&self.bind_addr, self.frame_config).await?;

        let router = Router::new(
            self.registry.unwrap_or_default(),
            self.sessions.unwrap_or_default(),
            Arc::new(HibernationCoordinator::new(self.max_concurrent_transfers)),
            Arc::new(transferer),
        );
        let state = Arc::new(ServerState {
            secret: self.secret,
            handshake_timeout: self.handshake_timeout,
            router,
            peers: RwLock::new(HashMap::new()),
        });

        Ok(SocketServer { transport, state })
    }
}

impl Default for SocketServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The control-plane socket server.
///
/// Grab whatever handles you need ([`router()`](Self::router),
/// [`registry()`](Self::registry), ...) and then call
/// [`run()`](Self::run) to start accepting connections.
pub struct SocketServer<T: Transferer> {
    transport: TcpTransport,
    state: Arc<ServerState<T>>,
}

impl<T: Transferer> SocketServer<T> {
    /// Creates a new builder.
    pub fn builder() -> SocketServerBuilder {
        SocketServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The routing layer the player-facing proxy places sessions through.
    pub fn router(&self) -> Router<T> {
        self.state.router.clone()
    }

    /// Returns the shared server registry.
    pub fn registry(&self) -> Arc<ServerRegistry> {
        Arc::clone(self.state.router.registry())
    }

    /// Returns the shared session store.
    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(self.state.router.sessions())
    }

    /// Returns the shared hibernation coordinator.
    pub fn hibernation(&self) -> Arc<HibernationCoordinator> {
        Arc::clone(self.state.router.hibernation())
    }

    /// Starts sending `UpdatePlayerLatency` to every registered backend
    /// each `interval`. Abort the returned handle to stop.
    pub fn report_player_latency(&self, interval: Duration) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                state.broadcast_latency().await;
            }
        })
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task per accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), PortalError> {
        tracing::info!("portal socket server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
