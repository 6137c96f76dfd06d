//! Wire protocol for Pairforge.
//!
//! This crate defines what clients and the server exchange:
//!
//! - **Identifiers** ([`PlayerId`], [`RoomId`]) — newtypes over `u64`.
//! - **Handshake** ([`Handshake`]) — the lines a client sends before it is
//!   matched. Recorded, never parsed.
//! - **Server messages** ([`ServerMessage`]) — one JSON object per line.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become bytes.
//!
//! ```text
//! Transport (lines) → Protocol (ServerMessage) → Room (players, rooms)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Handshake, PlayerId, RoomId, ServerMessage};
