//! Unified error type for the Pairforge server.

use pairforge_protocol::ProtocolError;
use pairforge_room::RoomError;
use pairforge_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PairforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (duplicate registration, closed room).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Invalid server configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The static asset server failed to bind or serve.
    #[error("asset server failed: {0}")]
    Assets(#[source] std::io::Error),
}
