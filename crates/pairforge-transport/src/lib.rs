//! Transport abstraction layer for Pairforge.
//!
//! Provides the [`Transport`] and [`Connection`] traits. A connection
//! exchanges text lines: the matchmaking handshake is a sequence of lines,
//! and every server reply is a single line.
//!
//! # Feature Flags
//!
//! - `tcp` (default) — newline-delimited TCP transport
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`,
//!   one frame per line

mod error;
#[cfg(feature = "tcp")]
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{MAX_LINE_BYTES, TcpLineConnection, TcpLineTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// The returned futures are `Send` so servers can drive any transport
/// from a spawned task.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// A single connection that exchanges text lines.
pub trait Connection: Send + Sync + 'static {
    /// Finishes any protocol setup `accept` left to the connection's own
    /// task, such as a WebSocket upgrade. Idempotent; the default has
    /// nothing to do.
    fn ready(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }

    /// Sends one line to the remote peer. The line must not contain a
    /// line terminator; the transport adds its own framing.
    fn send(
        &self,
        line: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next line from the remote peer, without its terminator.
    ///
    /// Returns `Ok(None)` when the peer closed its side cleanly.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_equality() {
        assert_eq!(ConnectionId::new(1), ConnectionId::new(1));
        assert_ne!(ConnectionId::new(1), ConnectionId::new(2));
    }
}
