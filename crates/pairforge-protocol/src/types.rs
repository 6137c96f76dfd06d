//! Core protocol types: identifiers, the handshake record, and the
//! messages the server sends.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected player.
///
/// Serialized as the bare number (`#[serde(transparent)]`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A unique identifier for a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

impl From<u64> for RoomId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// The lines a client sent before being matched.
///
/// No fields are parsed from it yet. `truncated` is set when reading
/// stopped for any reason other than an empty line or a clean end of
/// stream (receive error, timeout, line limit).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub lines: Vec<String>,
    pub truncated: bool,
}

impl Handshake {
    /// Returns `true` if the client sent no handshake lines at all.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Messages the server sends, one per line.
///
/// Internally tagged: `{"type":"Matched", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// The player has been placed in a room.
    ///
    /// `room_addr` is the room's own endpoint; `created` tells whether the
    /// room was opened for this player.
    Matched {
        player_id: PlayerId,
        room_id: RoomId,
        room_addr: SocketAddr,
        created: bool,
        capacity: usize,
    },

    /// Answer to one request line.
    Reply { body: String },

    /// Something went wrong; the server closes the connection after this.
    /// `code` follows HTTP conventions.
    Error { code: u16, message: String },
}
