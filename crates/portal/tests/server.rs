//! Integration tests for the socket server, handshake, and dispatch.
//!
//! Every test runs a real server on `127.0.0.1:0` and talks to it through
//! [`SocketClient`] the way a backend game server would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portal::prelude::*;
use portal_protocol::{
    AuthRequest, ClientType, FindPlayerRequest, PacketId, RegisterServer,
    ServerListRequest, TransferRequest, UpdatePlayerLatency, PROTOCOL_VERSION,
};
use portal_transport::{Connection, Frame, TcpConnection};

const SECRET: &str = "secret1";

// =========================================================================
// Test transferer and harness
// =========================================================================

/// Succeeds unless the target server's address starts with "unreachable".
#[derive(Default)]
struct TestTransferer {
    attempts: AtomicUsize,
}

impl TestTransferer {
    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transferer for TestTransferer {
    async fn transfer(
        &self,
        _session: &Session,
        server: &ServerEntry,
    ) -> Result<(), TransferError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if server.address.starts_with("unreachable") {
            return Err(TransferError::Unreachable {
                server: server.name.clone(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }
}

struct Harness {
    addr: String,
    router: Router<TestTransferer>,
}

impl Harness {
    fn registry(&self) -> &Arc<ServerRegistry> {
        self.router.registry()
    }

    fn sessions(&self) -> &Arc<SessionStore> {
        self.router.sessions()
    }
}

fn builder() -> SocketServerBuilder {
    SocketServerBuilder::new().bind("127.0.0.1:0").secret(SECRET)
}

/// Starts a server on a random port.
async fn start(builder: SocketServerBuilder) -> Harness {
    start_with_latency(builder, None).await
}

async fn start_with_latency(
    builder: SocketServerBuilder,
    latency_interval: Option<Duration>,
) -> Harness {
    let server = builder
        .build(TestTransferer::default())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let router = server.router();
    if let Some(interval) = latency_interval {
        let _reporter = server.report_player_latency(interval);
    }

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    Harness { addr, router }
}

/// Polls `check` until it holds, failing the test after two seconds.
async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should hold within 2s");
}

async fn recv(client: &SocketClient) -> Option<Packet> {
    tokio::time::timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("should receive within 2s")
        .expect("recv should not fail")
}

async fn authed_client(addr: &str, name: &str) -> SocketClient {
    let client = SocketClient::connect(addr).await.expect("should connect");
    let status = client.authenticate(SECRET, name).await.expect("handshake");
    assert_eq!(status, AuthStatus::Success);
    client
}

/// Round-trips a `ServerListRequest`. Packets on one connection are handled
/// in order, so everything sent before has been applied when this returns.
async fn server_list(client: &SocketClient) -> Vec<ServerInfo> {
    client.send(ServerListRequest).await.unwrap();
    match recv(client).await {
        Some(Packet::ServerListResponse(response)) => response.servers,
        other => panic!("expected ServerListResponse, got {other:?}"),
    }
}

async fn registered(addr: &str, name: &str, address: &str) -> SocketClient {
    let client = authed_client(addr, name).await;
    client.register_server(address).await.unwrap();
    server_list(&client).await;
    client
}

async fn transfer(client: &SocketClient, player: u64, server: &str) -> (TransferStatus, String) {
    client
        .send(TransferRequest {
            player: PlayerId(player),
            server: server.into(),
        })
        .await
        .unwrap();
    match recv(client).await {
        Some(Packet::TransferResponse(response)) => {
            assert_eq!(response.player, PlayerId(player));
            (response.status, response.reason)
        }
        other => panic!("expected TransferResponse, got {other:?}"),
    }
}

/// A connection that speaks frames directly, for payloads `SocketClient`
/// would never produce.
async fn raw_connection(addr: &str) -> TcpConnection {
    TcpConnection::connect(addr, FrameConfig::default())
        .await
        .expect("should connect")
}

async fn raw_recv(conn: &TcpConnection) -> Option<Packet> {
    let frame = tokio::time::timeout(Duration::from_secs(2), conn.recv())
        .await
        .expect("should receive within 2s")
        .expect("recv should not fail")?;
    Some(Packet::from_frame(&frame).expect("server sends valid packets"))
}

// =========================================================================
// End-to-end scenario
// =========================================================================

#[tokio::test]
async fn test_register_drains_hibernation_and_disconnect_cleans_registry() {
    let harness = start(builder()).await;
    let session = harness.sessions().create(PlayerId(1), "Steve").unwrap();
    let route = harness.router.connect(&session, None).await.unwrap();
    assert_eq!(route, Route::Hibernated);

    let client = authed_client(&harness.addr, "lobby").await;
    client.register_server("127.0.0.1:19132").await.unwrap();

    eventually(|| harness.registry().lookup("lobby").is_some()).await;
    let entry = harness.registry().lookup("lobby").unwrap();
    assert_eq!(entry.address, "127.0.0.1:19132");

    eventually(|| session.server().as_deref() == Some("lobby")).await;
    assert!(harness.router.hibernation().is_empty());

    drop(client);
    eventually(|| harness.registry().lookup("lobby").is_none()).await;
}

#[tokio::test]
async fn test_failed_drain_transfer_waits_for_next_registration() {
    let harness = start(builder()).await;
    let session = harness.sessions().create(PlayerId(1), "Steve").unwrap();
    harness.router.connect(&session, None).await.unwrap();

    let _broken = registered(&harness.addr, "broken", "unreachable:1").await;
    // Transferring while the attempt runs, hibernating again once it failed.
    eventually(|| harness.router.transferer().attempts() == 1 && session.is_hibernating()).await;
    assert!(harness.router.hibernation().contains(PlayerId(1)));

    let _lobby = registered(&harness.addr, "lobby", "127.0.0.1:19132").await;
    eventually(|| session.server().as_deref() == Some("lobby")).await;
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_wrong_secret_returns_incorrect_secret_and_closes() {
    let harness = start(builder()).await;
    let client = SocketClient::connect(&harness.addr).await.unwrap();

    let status = client.authenticate("wrong", "lobby").await.unwrap();

    assert_eq!(status, AuthStatus::IncorrectSecret);
    assert!(recv(&client).await.is_none(), "connection should close");
}

#[tokio::test]
async fn test_unknown_client_type_returns_unknown_type() {
    let harness = start(builder()).await;
    let client = SocketClient::connect(&harness.addr).await.unwrap();

    client
        .send(AuthRequest {
            protocol: PROTOCOL_VERSION,
            client_type: ClientType::Server.to_u8() + 7,
            secret: SECRET.into(),
            name: "lobby".into(),
        })
        .await
        .unwrap();

    match recv(&client).await {
        Some(Packet::AuthResponse(response)) => {
            assert_eq!(response.status, AuthStatus::UnknownType);
        }
        other => panic!("expected AuthResponse, got {other:?}"),
    }
    assert!(recv(&client).await.is_none());
}

#[tokio::test]
async fn test_non_auth_first_packet_returns_invalid_data() {
    let harness = start(builder()).await;
    let client = SocketClient::connect(&harness.addr).await.unwrap();

    client.register_server("127.0.0.1:19132").await.unwrap();

    match recv(&client).await {
        Some(Packet::AuthResponse(response)) => {
            assert_eq!(response.status, AuthStatus::InvalidData);
        }
        other => panic!("expected AuthResponse, got {other:?}"),
    }
    assert!(recv(&client).await.is_none());
    assert!(harness.registry().is_empty(), "unauthenticated peer must not register");
}

#[tokio::test]
async fn test_malformed_auth_request_returns_invalid_data_and_closes() {
    let harness = start(builder()).await;
    let conn = raw_connection(&harness.addr).await;

    conn.send(&Frame::new(PacketId::AuthRequest.as_u32(), vec![1, 2, 3]))
        .await
        .unwrap();

    match raw_recv(&conn).await {
        Some(Packet::AuthResponse(response)) => {
            assert_eq!(response.status, AuthStatus::InvalidData);
        }
        other => panic!("expected AuthResponse, got {other:?}"),
    }
    assert!(raw_recv(&conn).await.is_none(), "connection should close");
    assert!(harness.registry().is_empty());
}

#[tokio::test]
async fn test_empty_name_returns_invalid_data() {
    let harness = start(builder()).await;
    let client = SocketClient::connect(&harness.addr).await.unwrap();

    let status = client.authenticate(SECRET, "").await.unwrap();

    assert_eq!(status, AuthStatus::InvalidData);
}

#[tokio::test]
async fn test_silent_peer_is_closed_after_handshake_timeout() {
    let harness = start(builder().handshake_timeout(Duration::from_millis(100))).await;
    let client = SocketClient::connect(&harness.addr).await.unwrap();

    assert!(
        recv(&client).await.is_none(),
        "server should close without a response"
    );
}

// =========================================================================
// Registration
// =========================================================================

#[tokio::test]
async fn test_stale_unregister_does_not_drop_replacement() {
    let harness = start(builder()).await;
    let old = registered(&harness.addr, "lobby", "10.0.0.1:19132").await;
    let _new = registered(&harness.addr, "lobby", "10.0.0.2:19132").await;

    old.unregister_server().await.unwrap();
    server_list(&old).await;

    let entry = harness.registry().lookup("lobby").expect("replacement kept");
    assert_eq!(entry.address, "10.0.0.2:19132");
}

#[tokio::test]
async fn test_unregister_removes_own_entry() {
    let harness = start(builder()).await;
    let client = registered(&harness.addr, "lobby", "10.0.0.1:19132").await;

    client.unregister_server().await.unwrap();
    let servers = server_list(&client).await;

    assert!(servers.is_empty());
    assert!(harness.registry().lookup("lobby").is_none());
}

#[tokio::test]
async fn test_unexpected_packet_closes_connection_and_cleans_up() {
    let harness = start(builder()).await;
    let client = registered(&harness.addr, "lobby", "10.0.0.1:19132").await;

    client
        .send(UpdatePlayerLatency { latencies: vec![] })
        .await
        .unwrap();

    assert!(recv(&client).await.is_none());
    eventually(|| harness.registry().is_empty()).await;
}

#[tokio::test]
async fn test_decode_error_after_auth_closes_and_unregisters() {
    let harness = start(builder()).await;
    let conn = raw_connection(&harness.addr).await;
    let auth = Packet::from(AuthRequest {
        protocol: PROTOCOL_VERSION,
        client_type: ClientType::Server.to_u8(),
        secret: SECRET.into(),
        name: "lobby".into(),
    });
    conn.send(&auth.to_frame()).await.unwrap();
    assert!(matches!(raw_recv(&conn).await, Some(Packet::AuthResponse(_))));

    let register = Packet::from(RegisterServer {
        address: "10.0.0.1:19132".into(),
    });
    conn.send(&register.to_frame()).await.unwrap();
    eventually(|| harness.registry().lookup("lobby").is_some()).await;

    // A well-formed body followed by one byte too many.
    let mut trailing = register.to_frame();
    trailing.payload.push(0);
    conn.send(&trailing).await.unwrap();

    assert!(raw_recv(&conn).await.is_none(), "connection should close");
    eventually(|| harness.registry().lookup("lobby").is_none()).await;
}

#[tokio::test]
async fn test_unknown_packet_id_after_auth_closes_and_unregisters() {
    let harness = start(builder()).await;
    let client = registered(&harness.addr, "lobby", "10.0.0.1:19132").await;
    let conn = raw_connection(&harness.addr).await;
    let auth = Packet::from(AuthRequest {
        protocol: PROTOCOL_VERSION,
        client_type: ClientType::Server.to_u8(),
        secret: SECRET.into(),
        name: "hub".into(),
    });
    conn.send(&auth.to_frame()).await.unwrap();
    assert!(matches!(raw_recv(&conn).await, Some(Packet::AuthResponse(_))));
    let register = Packet::from(RegisterServer {
        address: "10.0.0.2:19132".into(),
    });
    conn.send(&register.to_frame()).await.unwrap();
    eventually(|| harness.registry().lookup("hub").is_some()).await;

    conn.send(&Frame::new(99, Vec::new())).await.unwrap();

    assert!(raw_recv(&conn).await.is_none(), "connection should close");
    eventually(|| harness.registry().lookup("hub").is_none()).await;
    let servers = server_list(&client).await;
    assert_eq!(servers.len(), 1, "other peers keep their entries");
}

#[tokio::test]
async fn test_reregistration_drains_to_address_it_registered() {
    let harness = start(builder()).await;
    let session = harness.sessions().create(PlayerId(1), "Steve").unwrap();
    harness.router.connect(&session, None).await.unwrap();

    let _first = registered(&harness.addr, "lobby", "unreachable:1").await;
    eventually(|| harness.router.transferer().attempts() == 1 && session.is_hibernating()).await;

    let _second = registered(&harness.addr, "lobby", "127.0.0.1:19132").await;

    eventually(|| session.server().as_deref() == Some("lobby")).await;
    assert_eq!(harness.router.transferer().attempts(), 2);
    assert_eq!(
        harness.registry().lookup("lobby").unwrap().address,
        "127.0.0.1:19132"
    );
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test]
async fn test_transfer_request_statuses() {
    let harness = start(builder()).await;
    let lobby = registered(&harness.addr, "lobby", "10.0.0.1:19132").await;
    let _hub = registered(&harness.addr, "hub", "10.0.0.2:19132").await;
    let _broken = registered(&harness.addr, "broken", "unreachable:1").await;

    let session = harness.sessions().create(PlayerId(1), "Steve").unwrap();
    harness.router.connect(&session, Some("lobby")).await.unwrap();

    assert_eq!(
        transfer(&lobby, 99, "hub").await.0,
        TransferStatus::PlayerNotFound
    );
    assert_eq!(
        transfer(&lobby, 1, "nowhere").await.0,
        TransferStatus::ServerNotFound
    );
    assert_eq!(
        transfer(&lobby, 1, "lobby").await.0,
        TransferStatus::AlreadyOnServer
    );

    let (status, reason) = transfer(&lobby, 1, "broken").await;
    assert_eq!(status, TransferStatus::Error);
    assert!(reason.contains("connection refused"));
    assert_eq!(session.server(), Some("lobby".into()));

    assert_eq!(transfer(&lobby, 1, "hub").await.0, TransferStatus::Success);
    assert_eq!(session.server(), Some("hub".into()));
}

#[tokio::test]
async fn test_server_list_reports_player_counts() {
    let harness = start(builder()).await;
    let lobby = registered(&harness.addr, "lobby", "10.0.0.1:19132").await;
    let _hub = registered(&harness.addr, "hub", "10.0.0.2:19132").await;

    for id in 1..=2 {
        let session = harness.sessions().create(PlayerId(id), format!("p{id}").as_str()).unwrap();
        harness.router.connect(&session, Some("lobby")).await.unwrap();
    }

    let servers = server_list(&lobby).await;

    assert_eq!(
        servers,
        vec![
            ServerInfo {
                name: "hub".into(),
                address: "10.0.0.2:19132".into(),
                player_count: 0,
            },
            ServerInfo {
                name: "lobby".into(),
                address: "10.0.0.1:19132".into(),
                player_count: 2,
            },
        ]
    );
}

#[tokio::test]
async fn test_find_player_by_id_and_by_name() {
    let harness = start(builder()).await;
    let lobby = registered(&harness.addr, "lobby", "10.0.0.1:19132").await;
    let session = harness.sessions().create(PlayerId(7), "Steve").unwrap();
    harness.router.connect(&session, Some("lobby")).await.unwrap();

    let requests = [
        FindPlayerRequest {
            player: PlayerId(7),
            name: String::new(),
        },
        FindPlayerRequest {
            player: PlayerId::NONE,
            name: "steve".into(),
        },
    ];
    for request in requests {
        lobby.send(request).await.unwrap();
        match recv(&lobby).await {
            Some(Packet::FindPlayerResponse(response)) => {
                assert!(response.online);
                assert_eq!(response.player, PlayerId(7));
                assert_eq!(response.name, "Steve");
                assert_eq!(response.server, "lobby");
            }
            other => panic!("expected FindPlayerResponse, got {other:?}"),
        }
    }

    lobby
        .send(FindPlayerRequest {
            player: PlayerId::NONE,
            name: "alex".into(),
        })
        .await
        .unwrap();
    match recv(&lobby).await {
        Some(Packet::FindPlayerResponse(response)) => {
            assert!(!response.online);
            assert_eq!(response.name, "alex");
            assert!(response.server.is_empty());
        }
        other => panic!("expected FindPlayerResponse, got {other:?}"),
    }
}

// =========================================================================
// Latency reporting
// =========================================================================

#[tokio::test]
async fn test_latency_reports_sent_to_owning_server() {
    let harness = start_with_latency(builder(), Some(Duration::from_millis(50))).await;
    let session = harness.sessions().create(PlayerId(3), "Alex").unwrap();
    session.set_latency_ms(42);
    harness.router.connect(&session, None).await.unwrap();

    let client = authed_client(&harness.addr, "lobby").await;
    client.register_server("10.0.0.1:19132").await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match client.recv().await {
                Ok(Some(Packet::UpdatePlayerLatency(update))) if !update.latencies.is_empty() => {
                    return update;
                }
                Ok(Some(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    })
    .await
    .expect("latency report within 2s");

    assert_eq!(report.latencies.len(), 1);
    assert_eq!(report.latencies[0].player, PlayerId(3));
    assert_eq!(report.latencies[0].latency_ms, 42);
}
