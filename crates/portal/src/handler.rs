//! Per-connection handler: handshake, then packet dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive AuthRequest within the handshake timeout → validate
//!   2. Send AuthResponse → peer is authenticated (or the connection closes)
//!   3. Loop: receive frames → decode → dispatch
//!
//! Any transport, decode, or handler error ends the loop. Cleanup of the
//! peer's registry entries runs in a drop guard, so it happens on every
//! exit path before the task finishes.

use std::sync::Arc;

use portal_protocol::{AuthResponse, AuthStatus, Packet};
use portal_session::Transferer;
use portal_transport::{Connection, ConnectionId, TcpConnection};

use crate::auth::{authenticate, PeerIdentity};
use crate::dispatch::{dispatch, Context};
use crate::server::{Peer, ServerState};
use crate::{HandshakeError, PortalError};

/// Drop guard that removes a peer and every server it registered.
///
/// `Drop` is synchronous and so are the registry and peer-map locks, so
/// the cleanup is complete by the time the guard is gone.
struct PeerGuard<T: Transferer> {
    conn_id: ConnectionId,
    state: Arc<ServerState<T>>,
}

impl<T: Transferer> Drop for PeerGuard<T> {
    fn drop(&mut self) {
        let removed = self.state.registry().remove_by_connection(self.conn_id);
        for entry in &removed {
            tracing::info!(
                conn_id = %self.conn_id,
                server = %entry.name,
                "server removed on disconnect"
            );
        }
        if let Some(peer) = self.state.remove_peer(self.conn_id) {
            tracing::info!(conn_id = %self.conn_id, name = %peer.name, "socket connection closed");
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<T: Transferer>(
    conn: TcpConnection,
    state: Arc<ServerState<T>>,
) -> Result<(), PortalError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer_addr = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    let identity = perform_handshake(&conn, &state).await?;

    tracing::info!(%conn_id, name = %identity.name, "socket connection authenticated");

    state.add_peer(
        conn_id,
        Peer {
            name: identity.name.clone(),
            client_type: identity.client_type,
            conn: Arc::clone(&conn),
        },
    );
    let _guard = PeerGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    // --- Step 2: Packet loop ---
    let ctx = Context {
        state: &state,
        peer: &identity,
        conn: &conn,
    };

    loop {
        let Some(frame) = conn.recv().await? else {
            tracing::debug!(%conn_id, "connection closed cleanly");
            break;
        };
        let packet = Packet::from_frame(&frame)?;
        dispatch(&ctx, packet).await?;
    }

    // _guard drops here → registry cleanup.
    Ok(())
}

/// Receives and answers the `AuthRequest`.
///
/// Sends exactly one `AuthResponse` if a frame arrived in time, then closes
/// the connection unless the status was `Success`.
async fn perform_handshake<T: Transferer>(
    conn: &TcpConnection,
    state: &ServerState<T>,
) -> Result<PeerIdentity, PortalError> {
    let frame = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(frame))) => frame,
        Ok(Ok(None)) => return Err(HandshakeError::Closed.into()),
        Ok(Err(e)) => return Err(PortalError::Transport(e)),
        Err(_) => {
            tracing::debug!(conn_id = %conn.id(), "handshake timed out");
            return Err(HandshakeError::TimedOut.into());
        }
    };

    let outcome = match Packet::from_frame(&frame) {
        Ok(Packet::AuthRequest(request)) => authenticate(&request, &state.secret),
        Ok(other) => Err(HandshakeError::InvalidData(format!(
            "expected AuthRequest, got {:?}",
            other.id()
        ))),
        Err(e) => Err(HandshakeError::InvalidData(e.to_string())),
    };

    let status = match &outcome {
        Ok(_) => AuthStatus::Success,
        Err(e) => e.status(),
    };
    conn.send(&Packet::from(AuthResponse { status }).to_frame())
        .await?;

    match outcome {
        Ok(identity) => Ok(identity),
        Err(e) => {
            tracing::info!(conn_id = %conn.id(), error = %e, "handshake rejected");
            if let Err(close) = conn.close().await {
                tracing::debug!(conn_id = %conn.id(), error = %close, "close failed");
            }
            Err(e.into())
        }
    }
}
