//! Per-room endpoints.
//!
//! Every room gets its own TCP line listener on an ephemeral port of the
//! configured room host. The listener is bound the first time a member is
//! told where the room lives and stops once the registry deletes the room.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use pairforge_protocol::{JsonCodec, ServerMessage};
use pairforge_room::{Room, RoomError};
use pairforge_transport::{Connection, TcpLineTransport, Transport};

use crate::PairforgeError;
use crate::service::{Endpoint, Request, RequestHandler};
use crate::session::send_message;

/// Binds and serves room endpoints on demand.
pub(crate) struct RoomEndpoints {
    host: IpAddr,
    handler: Arc<dyn RequestHandler>,
    codec: JsonCodec,
}

impl RoomEndpoints {
    pub(crate) fn new(host: IpAddr, handler: Arc<dyn RequestHandler>, codec: JsonCodec) -> Self {
        Self {
            host,
            handler,
            codec,
        }
    }

    /// Returns the room's endpoint address, binding it on first use.
    ///
    /// # Errors
    /// `RoomError::Closed` if the registry already deleted the room, or a
    /// transport error if the listener could not be bound.
    pub(crate) async fn ensure(&self, room: &Arc<Room>) -> Result<SocketAddr, PairforgeError> {
        if room.is_closed() {
            return Err(RoomError::Closed(room.id()).into());
        }
        room.endpoint_or_try_init(|| self.open(Arc::clone(room)))
            .await
    }

    async fn open(&self, room: Arc<Room>) -> Result<SocketAddr, PairforgeError> {
        let bind_addr = SocketAddr::new(self.host, 0).to_string();
        let transport = TcpLineTransport::bind(&bind_addr).await?;
        let addr = transport.local_addr()?;
        tracing::info!(room_id = %room.id(), %addr, "room endpoint listening");

        tokio::spawn(serve_room(
            transport,
            room,
            Arc::clone(&self.handler),
            self.codec,
        ));
        Ok(addr)
    }
}

async fn serve_room(
    mut transport: TcpLineTransport,
    room: Arc<Room>,
    handler: Arc<dyn RequestHandler>,
    codec: JsonCodec,
) {
    let room_id = room.id();
    loop {
        tokio::select! {
            () = room.closed() => break,
            accepted = transport.accept() => match accepted {
                Ok(conn) => {
                    tokio::spawn(serve_room_connection(
                        conn,
                        Arc::clone(&room),
                        Arc::clone(&handler),
                        codec,
                    ));
                }
                Err(e) => {
                    tracing::warn!(%room_id, error = %e, "room accept failed");
                }
            },
        }
    }
    tracing::info!(%room_id, "room endpoint stopped");
}

async fn serve_room_connection<C: Connection>(
    conn: C,
    room: Arc<Room>,
    handler: Arc<dyn RequestHandler>,
    codec: JsonCodec,
) {
    let room_id = room.id();
    let conn_id = conn.id();
    tracing::debug!(%room_id, %conn_id, "room connection opened");

    loop {
        let received = tokio::select! {
            () = room.closed() => break,
            received = conn.recv() => received,
        };
        let body = match received {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(%room_id, %conn_id, error = %e, "room recv error");
                break;
            }
        };

        let request = Request {
            endpoint: Endpoint::Room(room_id),
            player: None,
            room: Some(room.info().await),
            body,
        };
        let response = handler.handle(&request);
        let reply = ServerMessage::Reply { body: response.body };
        if let Err(e) = send_message(&conn, &codec, &reply).await {
            tracing::debug!(%room_id, %conn_id, error = %e, "room send failed");
            break;
        }
    }

    let _ = conn.close().await;
    tracing::debug!(%room_id, %conn_id, "room connection closed");
}
