//! # Portal
//!
//! Control plane for a game server reverse proxy.
//!
//! Backend game servers connect to the proxy over a private socket,
//! authenticate with a shared secret, and register themselves. The proxy
//! keeps a registry of live servers, routes players onto them, and parks
//! players in hibernation while no server is available. When a server
//! registers, every hibernating player is transferred to it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portal::prelude::*;
//!
//! struct NoopTransferer;
//!
//! impl Transferer for NoopTransferer {
//!     async fn transfer(
//!         &self,
//!         _session: &Session,
//!         _server: &ServerEntry,
//!     ) -> Result<(), TransferError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), PortalError> {
//! let config = Config::load_or_create("config.json")?;
//! let server = SocketServerBuilder::from_config(&config)
//!     .build(NoopTransferer)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod client;
mod config;
mod dispatch;
mod error;
mod handler;
pub mod logging;
mod routing;
mod server;

pub use auth::{authenticate, secrets_match, PeerIdentity};
pub use client::SocketClient;
pub use config::{
    CommunicationConfig, Config, LoggerConfig, PlayerLatencyConfig, WhitelistConfig,
};
pub use error::{ConfigError, HandshakeError, PortalError};
pub use routing::{Route, Router};
pub use server::{SocketServer, SocketServerBuilder};

/// Convenience re-exports for the common case.
pub mod prelude {
    pub use crate::logging::init_logging;
    pub use crate::{
        Config, ConfigError, HandshakeError, PortalError, Route, Router,
        SocketClient, SocketServer, SocketServerBuilder,
    };
    pub use portal_protocol::{
        AuthStatus, Packet, PlayerId, ServerInfo, TransferStatus,
    };
    pub use portal_registry::{ServerEntry, ServerRegistry};
    pub use portal_session::{
        DrainReport, HibernationCoordinator, Session, SessionError,
        SessionState, SessionStore, TransferError, Transferer,
    };
    pub use portal_transport::{ConnectionId, FrameConfig};
}
