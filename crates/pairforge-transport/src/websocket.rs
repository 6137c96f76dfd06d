//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each text frame carries one line. Binary frames are accepted when they
//! hold valid UTF-8, so byte-oriented clients work too.
//!
//! `accept` only accepts the TCP stream. The HTTP upgrade runs on first
//! use of the connection (or an explicit [`Connection::ready`]), so it
//! happens in the connection's own task and a client that never upgrades
//! cannot hold up the listener.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, OnceCell};
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn accept(&mut self) -> Result<WebSocketConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection for WebSocket");

        Ok(WebSocketConnection {
            id,
            peer,
            unupgraded: Mutex::new(Some(stream)),
            upgraded: OnceCell::new(),
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::BindFailed)
    }
}

/// Both halves of an upgraded socket.
///
/// The sink and stream halves are locked separately so a pending `recv`
/// never blocks a `send`.
struct Halves {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    /// The raw stream until the upgrade takes it.
    unupgraded: Mutex<Option<TcpStream>>,
    upgraded: OnceCell<Halves>,
}

impl WebSocketConnection {
    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Runs the HTTP upgrade once and returns the split socket.
    ///
    /// If an upgrade is cancelled part-way, the raw stream is gone and
    /// every later call fails with `ConnectionClosed`.
    async fn halves(&self) -> Result<&Halves, TransportError> {
        self.upgraded
            .get_or_try_init(|| async {
                let stream = self.unupgraded.lock().await.take().ok_or_else(|| {
                    TransportError::ConnectionClosed(
                        "WebSocket upgrade did not complete".into(),
                    )
                })?;

                let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
                    TransportError::AcceptFailed(io::Error::new(
                        io::ErrorKind::ConnectionRefused,
                        e,
                    ))
                })?;
                tracing::debug!(id = %self.id, peer = %self.peer, "WebSocket upgraded");

                let (sink, stream) = ws.split();
                Ok(Halves {
                    sink: Mutex::new(sink),
                    stream: Mutex::new(stream),
                })
            })
            .await
    }
}

impl Connection for WebSocketConnection {
    async fn ready(&self) -> Result<(), TransportError> {
        self.halves().await.map(|_| ())
    }

    async fn send(&self, line: &str) -> Result<(), TransportError> {
        let halves = self.halves().await?;
        let msg = Message::Text(line.to_owned().into());
        halves.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        let halves = self.halves().await?;
        let mut stream = halves.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec()).map(Some).map_err(
                        |e| {
                            TransportError::ReceiveFailed(io::Error::new(
                                io::ErrorKind::InvalidData,
                                e,
                            ))
                        },
                    );
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let Some(halves) = self.upgraded.get() else {
            // Never upgraded: dropping the raw stream closes it.
            drop(self.unupgraded.lock().await.take());
            return Ok(());
        };
        halves.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
