//! Per-connection session: handshake, registration, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Read handshake lines until an empty line or end of stream
//!   2. Allocate a player id and register with the matchmaking registry
//!   3. Make sure the room's endpoint is up, send `Matched`
//!   4. Answer request lines until the connection closes
//!   5. Unregister, close the connection

use std::sync::Arc;
use std::time::Duration;

use pairforge_protocol::{Codec, Handshake, JsonCodec, PlayerId, ServerMessage};
use pairforge_room::{MatchmakingRegistry, Placement, Player};
use pairforge_transport::{Connection, TransportError};

use crate::PairforgeError;
use crate::server::ServerState;
use crate::service::{Endpoint, Request};

/// Bounds on how long and how much a handshake may take.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HandshakeLimits {
    pub(crate) timeout: Duration,
    pub(crate) max_lines: usize,
}

/// Unregisters a player exactly once when the session ends.
///
/// The normal path awaits [`release`](Self::release). If the session task
/// unwinds or is cancelled first, `Drop` spawns the unregister instead.
/// `unregister` tolerates unknown players, so a release interrupted
/// mid-way and finished by `Drop` is still safe.
struct Registration {
    player_id: PlayerId,
    registry: Option<Arc<MatchmakingRegistry>>,
}

impl Registration {
    fn new(player_id: PlayerId, registry: Arc<MatchmakingRegistry>) -> Self {
        Self {
            player_id,
            registry: Some(registry),
        }
    }

    async fn release(mut self) {
        if let Some(registry) = &self.registry {
            registry.unregister(self.player_id).await;
        }
        self.registry = None;
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(registry) = self.registry.take() else {
            return;
        };
        let player_id = self.player_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.unregister(player_id).await;
                });
            }
            Err(_) => {
                tracing::warn!(%player_id, "no runtime left to unregister player");
            }
        }
    }
}

/// Handles a single matchmaking connection from accept to close.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    state: Arc<ServerState>,
) -> Result<(), PairforgeError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // Transport setup shares the handshake budget. A peer that never
    // finishes it is dropped before it becomes a player.
    match tokio::time::timeout(state.handshake.timeout, conn.ready()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let _ = conn.close().await;
            return Err(e.into());
        }
        Err(_) => {
            tracing::debug!(%conn_id, "transport setup timed out");
            let _ = conn.close().await;
            return Err(TransportError::ConnectionClosed(
                "transport setup timed out".into(),
            )
            .into());
        }
    }

    let handshake = read_handshake(&conn, state.handshake).await;
    tracing::debug!(
        %conn_id,
        lines = handshake.lines.len(),
        truncated = handshake.truncated,
        "handshake complete"
    );

    let player = Player::new(state.player_ids.next(), conn_id);
    let placement = match state.registry.register(player).await {
        Ok(placement) => placement,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let registration = Registration::new(player.id(), Arc::clone(&state.registry));

    let result = serve_player(&conn, &state, player, &placement).await;

    registration.release().await;
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::info!(%conn_id, player_id = %player.id(), "session ended");
    result
}

/// Reads handshake lines. Never fails: a receive error, the timeout, or
/// the line limit end the handshake early and mark it truncated.
pub(crate) async fn read_handshake<C: Connection>(
    conn: &C,
    limits: HandshakeLimits,
) -> Handshake {
    let mut handshake = Handshake::default();
    let deadline = tokio::time::Instant::now() + limits.timeout;

    loop {
        if handshake.lines.len() >= limits.max_lines {
            tracing::debug!(conn_id = %conn.id(), "handshake line limit reached");
            handshake.truncated = true;
            break;
        }
        match tokio::time::timeout_at(deadline, conn.recv()).await {
            Ok(Ok(Some(line))) if line.is_empty() => break,
            Ok(Ok(Some(line))) => handshake.lines.push(line),
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                tracing::debug!(
                    conn_id = %conn.id(),
                    error = %e,
                    "handshake read failed, continuing with what was read"
                );
                handshake.truncated = true;
                break;
            }
            Err(_) => {
                tracing::debug!(conn_id = %conn.id(), "handshake timed out");
                handshake.truncated = true;
                break;
            }
        }
    }

    handshake
}

/// Tells the player where they landed, then answers requests until the
/// peer goes away.
async fn serve_player<C: Connection>(
    conn: &C,
    state: &ServerState,
    player: Player,
    placement: &Placement,
) -> Result<(), PairforgeError> {
    let player_id = player.id();
    let room = &placement.room;

    let room_addr = match state.endpoints.ensure(room).await {
        Ok(addr) => addr,
        Err(e) => {
            tracing::warn!(%player_id, room_id = %room.id(), error = %e, "room endpoint unavailable");
            let msg = ServerMessage::Error {
                code: 503,
                message: e.to_string(),
            };
            send_message(conn, &state.codec, &msg).await?;
            return Err(e);
        }
    };

    send_message(
        conn,
        &state.codec,
        &ServerMessage::Matched {
            player_id,
            room_id: room.id(),
            room_addr,
            created: placement.created,
            capacity: room.capacity(),
        },
    )
    .await?;

    loop {
        let body = match conn.recv().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };

        let request = Request {
            endpoint: Endpoint::Lobby,
            player: Some(player_id),
            room: Some(room.info().await),
            body,
        };
        let response = state.lobby.handle(&request);
        send_message(conn, &state.codec, &ServerMessage::Reply { body: response.body })
            .await?;
    }

    Ok(())
}

/// Encodes a server message and sends it as one line.
pub(crate) async fn send_message<C: Connection>(
    conn: &C,
    codec: &JsonCodec,
    msg: &ServerMessage,
) -> Result<(), PairforgeError> {
    let line = codec.encode(msg)?;
    conn.send(&line).await?;
    Ok(())
}
