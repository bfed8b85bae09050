//! Packet dispatch for authenticated connections.
//!
//! One exhaustive `match` over [`Packet`] sends every kind to its handler.
//! Packets that only ever travel proxy → backend are errors when a backend
//! sends them, and end the connection.

use portal_protocol::{
    FindPlayerRequest, FindPlayerResponse, Packet, RegisterServer, ServerInfo,
    ServerListRequest, ServerListResponse, TransferRequest, TransferResponse,
    TransferStatus, UnregisterServer,
};
use portal_registry::ServerEntry;
use portal_session::Transferer;
use portal_transport::{Connection, TcpConnection};

use crate::auth::PeerIdentity;
use crate::server::ServerState;
use crate::PortalError;

/// Everything a handler may touch.
pub(crate) struct Context<'a, T: Transferer> {
    pub(crate) state: &'a ServerState<T>,
    pub(crate) peer: &'a PeerIdentity,
    pub(crate) conn: &'a TcpConnection,
}

impl<T: Transferer> Context<'_, T> {
    async fn respond(&self, packet: impl Into<Packet>) -> Result<(), PortalError> {
        self.conn.send(&packet.into().to_frame()).await?;
        Ok(())
    }
}

pub(crate) async fn dispatch<T: Transferer>(
    ctx: &Context<'_, T>,
    packet: Packet,
) -> Result<(), PortalError> {
    match packet {
        Packet::RegisterServer(p) => handle_register_server(ctx, p),
        Packet::UnregisterServer(p) => handle_unregister_server(ctx, p),
        Packet::TransferRequest(p) => handle_transfer_request(ctx, p).await,
        Packet::ServerListRequest(p) => handle_server_list_request(ctx, p).await,
        Packet::FindPlayerRequest(p) => handle_find_player_request(ctx, p).await,
        unexpected @ (Packet::AuthRequest(_)
        | Packet::AuthResponse(_)
        | Packet::TransferResponse(_)
        | Packet::ServerListResponse(_)
        | Packet::FindPlayerResponse(_)
        | Packet::UpdatePlayerLatency(_)) => {
            tracing::warn!(
                conn_id = %ctx.conn.id(),
                packet = ?unexpected.id(),
                "unexpected packet from backend"
            );
            Err(PortalError::UnexpectedPacket(unexpected.id()))
        }
    }
}

/// Registers the peer as a server, then moves hibernating players onto it.
fn handle_register_server<T: Transferer>(
    ctx: &Context<'_, T>,
    packet: RegisterServer,
) -> Result<(), PortalError> {
    let name = &ctx.peer.name;
    let replaced = ctx
        .state
        .registry()
        .add(name, &packet.address, ctx.conn.id());
    tracing::info!(
        conn_id = %ctx.conn.id(),
        server = %name,
        address = %packet.address,
        replaced = replaced.is_some(),
        "server registered"
    );

    // Drain to what this packet registered, not to whatever the registry
    // holds by the time the drain starts.
    let entry = ServerEntry {
        name: name.clone(),
        address: packet.address,
        owner: ctx.conn.id(),
    };
    // Detached: drain failures only affect the drained sessions.
    drop(ctx.state.router.drain_to(entry));
    Ok(())
}

fn handle_unregister_server<T: Transferer>(
    ctx: &Context<'_, T>,
    _packet: UnregisterServer,
) -> Result<(), PortalError> {
    let name = &ctx.peer.name;
    if ctx.state.registry().remove_if_owned(name, ctx.conn.id()) {
        tracing::info!(conn_id = %ctx.conn.id(), server = %name, "server unregistered");
    } else {
        tracing::debug!(
            conn_id = %ctx.conn.id(),
            server = %name,
            "unregister ignored, entry not owned by this connection"
        );
    }
    Ok(())
}

async fn handle_transfer_request<T: Transferer>(
    ctx: &Context<'_, T>,
    packet: TransferRequest,
) -> Result<(), PortalError> {
    let router = &ctx.state.router;
    let player = packet.player;

    let (status, reason) = match router.sessions().get(player) {
        None => (TransferStatus::PlayerNotFound, String::new()),
        Some(session) => match ctx.state.registry().lookup(&packet.server) {
            None => (TransferStatus::ServerNotFound, String::new()),
            Some(server) if session.is_on(&server.name) => {
                (TransferStatus::AlreadyOnServer, String::new())
            }
            Some(server) => match router.transfer(&session, &server).await {
                Ok(()) => (TransferStatus::Success, String::new()),
                Err(e) => (TransferStatus::Error, e.to_string()),
            },
        },
    };

    tracing::debug!(
        conn_id = %ctx.conn.id(),
        %player,
        server = %packet.server,
        ?status,
        "transfer request handled"
    );
    ctx.respond(TransferResponse {
        player,
        status,
        reason,
    })
    .await
}

async fn handle_server_list_request<T: Transferer>(
    ctx: &Context<'_, T>,
    _packet: ServerListRequest,
) -> Result<(), PortalError> {
    let sessions = ctx.state.router.sessions();
    let mut servers: Vec<ServerInfo> = ctx
        .state
        .registry()
        .entries()
        .into_iter()
        .map(|entry| ServerInfo {
            player_count: u32::try_from(sessions.count_on(&entry.name)).unwrap_or(u32::MAX),
            name: entry.name,
            address: entry.address,
        })
        .collect();
    servers.sort_by(|a, b| a.name.cmp(&b.name));

    ctx.respond(ServerListResponse { servers }).await
}

/// Looks a player up by id, or by name when the id is unset.
async fn handle_find_player_request<T: Transferer>(
    ctx: &Context<'_, T>,
    packet: FindPlayerRequest,
) -> Result<(), PortalError> {
    let sessions = ctx.state.router.sessions();
    let found = if packet.player.is_none() {
        sessions.find_by_name(&packet.name)
    } else {
        sessions.get(packet.player)
    };

    let response = match found {
        Some(session) if !session.is_disconnected() => FindPlayerResponse {
            player: session.id(),
            name: session.name().to_string(),
            online: true,
            server: session.server().unwrap_or_default(),
        },
        _ => FindPlayerResponse {
            player: packet.player,
            name: packet.name,
            online: false,
            server: String::new(),
        },
    };
    ctx.respond(response).await
}
