//! Integration tests for the Pairforge server: matchmaking, room endpoints,
//! cleanup, and the asset server.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pairforge::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

struct LineClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl LineClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let (read, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("send");
    }

    async fn send_line(&mut self, line: &str) {
        self.send_raw(format!("{line}\n").as_bytes()).await;
    }

    async fn recv(&mut self) -> Option<ServerMessage> {
        let line = tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("server should answer in time")
            .expect("read line")?;
        Some(serde_json::from_str(&line).expect("server sends JSON lines"))
    }

    /// Sends `lines` followed by the blank terminator and waits for
    /// `Matched`.
    async fn handshake(&mut self, lines: &[&str]) -> Matched {
        for line in lines {
            self.send_line(line).await;
        }
        self.send_line("").await;
        expect_matched(self.recv().await)
    }
}

#[derive(Debug)]
struct Matched {
    player_id: PlayerId,
    room_id: RoomId,
    room_addr: SocketAddr,
    created: bool,
    capacity: usize,
}

fn expect_matched(msg: Option<ServerMessage>) -> Matched {
    match msg {
        Some(ServerMessage::Matched {
            player_id,
            room_id,
            room_addr,
            created,
            capacity,
        }) => Matched {
            player_id,
            room_id,
            room_addr,
            created,
            capacity,
        },
        other => panic!("expected Matched, got {other:?}"),
    }
}

fn expect_reply(msg: Option<ServerMessage>) -> String {
    match msg {
        Some(ServerMessage::Reply { body }) => body,
        other => panic!("expected Reply, got {other:?}"),
    }
}

/// Starts a TCP server on a random port. Returns its address and registry.
async fn start_server(
    builder: PairforgeServerBuilder,
) -> (SocketAddr, std::sync::Arc<MatchmakingRegistry>) {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("should have local addr");
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, registry)
}

async fn wait_for_rooms(registry: &MatchmakingRegistry, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.room_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("room count never reached {expected}"));
}

// =========================================================================
// Matchmaking
// =========================================================================

#[tokio::test]
async fn test_two_players_share_a_room_and_third_opens_another() {
    let (addr, registry) = start_server(PairforgeServerBuilder::new()).await;

    let mut c1 = LineClient::connect(addr).await;
    let m1 = c1.handshake(&["hello from one"]).await;
    assert!(m1.created);
    assert_eq!(m1.capacity, 2);

    let mut c2 = LineClient::connect(addr).await;
    let m2 = c2.handshake(&["hello from two"]).await;
    assert!(!m2.created);
    assert_eq!(m2.room_id, m1.room_id);
    assert_eq!(m2.room_addr, m1.room_addr);
    assert_ne!(m2.player_id, m1.player_id);

    let mut c3 = LineClient::connect(addr).await;
    let m3 = c3.handshake(&[]).await;
    assert!(m3.created);
    assert_ne!(m3.room_id, m1.room_id);
    assert_ne!(m3.room_addr, m1.room_addr);

    assert_eq!(registry.room_count().await, 2);
    assert_eq!(registry.player_count().await, 3);
}

#[tokio::test]
async fn test_lobby_lines_are_answered() {
    let (addr, _registry) = start_server(PairforgeServerBuilder::new()).await;

    let mut client = LineClient::connect(addr).await;
    let matched = client.handshake(&["hi"]).await;

    client.send_line("ping").await;
    let body = expect_reply(client.recv().await);
    assert_eq!(
        body,
        format!(
            "hello {}, you are in room {} (1/2)",
            matched.player_id, matched.room_id
        )
    );
}

#[tokio::test]
async fn test_custom_lobby_handler() {
    let builder = PairforgeServerBuilder::new()
        .lobby_handler(|req: &Request| Response::new(req.body.to_uppercase()));
    let (addr, _registry) = start_server(builder).await;

    let mut client = LineClient::connect(addr).await;
    client.handshake(&[]).await;
    client.send_line("shout").await;
    assert_eq!(expect_reply(client.recv().await), "SHOUT");
}

#[tokio::test]
async fn test_room_capacity_is_configurable() {
    let (addr, registry) =
        start_server(PairforgeServerBuilder::new().room_capacity(3)).await;

    let mut clients = Vec::new();
    let mut rooms = Vec::new();
    for _ in 0..3 {
        let mut client = LineClient::connect(addr).await;
        let matched = client.handshake(&[]).await;
        assert_eq!(matched.capacity, 3);
        rooms.push(matched.room_id);
        clients.push(client);
    }
    assert!(rooms.iter().all(|r| *r == rooms[0]));
    assert_eq!(registry.room_count().await, 1);
}

// =========================================================================
// Handshake edge cases
// =========================================================================

#[tokio::test]
async fn test_handshake_ended_by_half_close() {
    let (addr, _registry) = start_server(PairforgeServerBuilder::new()).await;

    let mut client = LineClient::connect(addr).await;
    client.send_line("only line").await;
    client.writer.shutdown().await.expect("shutdown write side");

    let matched = expect_matched(client.recv().await);
    assert!(matched.created);
}

#[tokio::test]
async fn test_invalid_utf8_handshake_is_still_matched() {
    let (addr, _registry) = start_server(PairforgeServerBuilder::new()).await;

    let mut client = LineClient::connect(addr).await;
    client.send_raw(b"\xff\xfe broken\n").await;

    let matched = expect_matched(client.recv().await);
    assert!(matched.created);
}

#[tokio::test]
async fn test_slow_handshake_times_out_and_is_matched() {
    let builder =
        PairforgeServerBuilder::new().handshake_timeout(Duration::from_millis(100));
    let (addr, _registry) = start_server(builder).await;

    let mut client = LineClient::connect(addr).await;
    // No blank line: the handshake only ends on the timeout.
    client.send_line("still typing").await;

    let matched = expect_matched(client.recv().await);
    assert!(matched.created);
}

#[tokio::test]
async fn test_handshake_line_limit() {
    let builder = PairforgeServerBuilder::new()
        .max_handshake_lines(2)
        .handshake_timeout(Duration::from_secs(30));
    let (addr, _registry) = start_server(builder).await;

    let mut client = LineClient::connect(addr).await;
    client.send_line("one").await;
    client.send_line("two").await;

    // Matched arrives without a blank line and well before the timeout.
    let matched = expect_matched(client.recv().await);
    assert!(matched.created);
}

#[tokio::test]
async fn test_partial_line_survives_handshake_timeout() {
    let builder = PairforgeServerBuilder::new()
        .handshake_timeout(Duration::from_millis(100))
        .lobby_handler(|req: &Request| Response::new(req.body.clone()));
    let (addr, _registry) = start_server(builder).await;

    let mut client = LineClient::connect(addr).await;
    // The handshake times out while this line is half written.
    client.send_raw(b"pin").await;
    expect_matched(client.recv().await);

    client.send_raw(b"g\n").await;
    assert_eq!(expect_reply(client.recv().await), "ping");
}

#[tokio::test]
async fn test_overlong_handshake_line_is_dropped_whole() {
    let builder = PairforgeServerBuilder::new()
        .lobby_handler(|req: &Request| Response::new(req.body.clone()));
    let (addr, _registry) = start_server(builder).await;

    let mut client = LineClient::connect(addr).await;
    let mut long = vec![b'a'; 3 * 8 * 1024];
    long.push(b'\n');
    client.send_raw(&long).await;
    expect_matched(client.recv().await);

    // The tail of the rejected line is not answered as a request.
    client.send_line("ping").await;
    assert_eq!(expect_reply(client.recv().await), "ping");
}

// =========================================================================
// Room endpoints and cleanup
// =========================================================================

#[tokio::test]
async fn test_room_endpoint_lists_members() {
    let (addr, _registry) = start_server(PairforgeServerBuilder::new()).await;

    let mut c1 = LineClient::connect(addr).await;
    let m1 = c1.handshake(&[]).await;
    let mut c2 = LineClient::connect(addr).await;
    let m2 = c2.handshake(&[]).await;

    let mut room = LineClient::connect(m1.room_addr).await;
    room.send_line("who is here").await;
    let body = expect_reply(room.recv().await);
    assert_eq!(
        body,
        format!(
            "hello from room {}: {}, {} (2/2)",
            m1.room_id, m1.player_id, m2.player_id
        )
    );
}

#[tokio::test]
async fn test_custom_room_handler() {
    let builder = PairforgeServerBuilder::new().room_handler(|req: &Request| {
        let Endpoint::Room(room_id) = req.endpoint else {
            return Response::new("wrong endpoint");
        };
        Response::new(format!("{room_id}:{}", req.body))
    });
    let (addr, _registry) = start_server(builder).await;

    let mut client = LineClient::connect(addr).await;
    let matched = client.handshake(&[]).await;

    let mut room = LineClient::connect(matched.room_addr).await;
    room.send_line("echo").await;
    assert_eq!(
        expect_reply(room.recv().await),
        format!("{}:echo", matched.room_id)
    );
}

#[tokio::test]
async fn test_disconnect_deletes_room_and_stops_endpoint() {
    let (addr, registry) = start_server(PairforgeServerBuilder::new()).await;

    let mut client = LineClient::connect(addr).await;
    let matched = client.handshake(&[]).await;
    assert_eq!(registry.room_count().await, 1);

    let mut room_conn = LineClient::connect(matched.room_addr).await;
    room_conn.send_line("hi").await;
    expect_reply(room_conn.recv().await);
    drop(client);

    wait_for_rooms(&registry, 0).await;
    assert_eq!(registry.player_count().await, 0);

    // Open room connections are closed once the room is deleted.
    assert!(room_conn.recv().await.is_none());

    // The listener goes away too.
    let refused = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if TcpStream::connect(matched.room_addr).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(refused.is_ok(), "room endpoint should stop accepting");
}

#[tokio::test]
async fn test_freed_slot_is_reused() {
    let (addr, registry) = start_server(PairforgeServerBuilder::new()).await;

    let mut c1 = LineClient::connect(addr).await;
    let m1 = c1.handshake(&[]).await;
    let mut c2 = LineClient::connect(addr).await;
    let m2 = c2.handshake(&[]).await;
    assert_eq!(m1.room_id, m2.room_id);

    drop(c2);
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.player_count().await != 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("second player should be unregistered");

    let mut c3 = LineClient::connect(addr).await;
    let m3 = c3.handshake(&[]).await;
    assert!(!m3.created);
    assert_eq!(m3.room_id, m1.room_id);
    assert_eq!(registry.room_count().await, 1);
}

#[tokio::test]
async fn test_unbindable_room_host_reports_503_and_cleans_up() {
    // TEST-NET-1 is never a local address, so the room listener cannot bind.
    let builder = PairforgeServerBuilder::new().room_host("192.0.2.1".parse().unwrap());
    let (addr, registry) = start_server(builder).await;

    let mut client = LineClient::connect(addr).await;
    client.send_line("").await;
    match client.recv().await {
        Some(ServerMessage::Error { code, .. }) => assert_eq!(code, 503),
        other => panic!("expected Error 503, got {other:?}"),
    }
    assert!(client.recv().await.is_none(), "session should end after 503");

    wait_for_rooms(&registry, 0).await;
    assert_eq!(registry.player_count().await, 0);
}

// =========================================================================
// WebSocket transport
// =========================================================================

#[tokio::test]
async fn test_websocket_clients_are_matched() {
    let server = PairforgeServerBuilder::new()
        .bind("127.0.0.1:0")
        .build_websocket()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut matched = Vec::new();
    let mut sockets = Vec::new();
    for _ in 0..2 {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("should connect");
        ws.send(Message::Text(String::from("hello").into()))
            .await
            .expect("send");
        ws.send(Message::Text(String::new().into())).await.expect("send");

        let frame = ws.next().await.expect("frame").expect("recv");
        let msg: ServerMessage =
            serde_json::from_str(frame.to_text().expect("text frame")).expect("json");
        matched.push(expect_matched(Some(msg)));
        sockets.push(ws);
    }

    assert!(matched[0].created);
    assert!(!matched[1].created);
    assert_eq!(matched[0].room_id, matched[1].room_id);

    let ws = &mut sockets[1];
    ws.send(Message::Text(String::from("ping").into()))
        .await
        .expect("send");
    let frame = ws.next().await.expect("frame").expect("recv");
    let msg: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert!(expect_reply(Some(msg)).contains("(2/2)"));
}

#[tokio::test]
async fn test_idle_websocket_client_does_not_block_others() {
    let server = PairforgeServerBuilder::new()
        .bind("127.0.0.1:0")
        .handshake_timeout(Duration::from_millis(200))
        .build_websocket()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr");
    let registry = server.registry();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Opens TCP but never sends the upgrade request.
    let mut idle = TcpStream::connect(addr).await.expect("connect idle");

    let (mut ws, _) = tokio::time::timeout(
        Duration::from_secs(2),
        tokio_tungstenite::connect_async(format!("ws://{addr}")),
    )
    .await
    .expect("upgrade should not wait on the idle client")
    .expect("should connect");
    ws.send(Message::Text(String::new().into())).await.expect("send");
    let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("matched in time")
        .expect("frame")
        .expect("recv");
    let msg: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert!(expect_matched(Some(msg)).created);

    // The idle peer is dropped once the setup budget runs out, unregistered.
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), idle.read(&mut buf))
        .await
        .expect("idle client should be closed");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(registry.player_count().await, 1);
}

// =========================================================================
// Static assets
// =========================================================================

#[cfg(feature = "assets")]
#[tokio::test]
async fn test_asset_server_serves_files() {
    let server = PairforgeServerBuilder::new()
        .bind("127.0.0.1:0")
        .assets(AssetsConfig {
            bind_addr: "127.0.0.1:0".into(),
            dir: env!("CARGO_MANIFEST_DIR").into(),
        })
        .build()
        .await
        .expect("server should build");
    let assets_addr = server.assets_addr().expect("assets enabled");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut stream = TcpStream::connect(assets_addr).await.expect("connect");
    stream
        .write_all(b"GET /Cargo.toml HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("send request");

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
        .await
        .expect("response in time")
        .expect("read response");

    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
    assert!(response.contains("name = \"pairforge\""));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let result = PairforgeServerBuilder::new()
        .bind("127.0.0.1:0")
        .room_capacity(0)
        .build()
        .await;
    assert!(matches!(result, Err(PairforgeError::Config(_))));
}
