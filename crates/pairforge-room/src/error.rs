//! Error types for the room layer.
//!
//! A full room and a missing player are not errors: the first moves
//! matchmaking on to the next room, the second is already cleaned up.

use pairforge_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A player with this id is already in the registry.
    #[error("player {0} is already registered")]
    AlreadyRegistered(PlayerId),

    /// The room has been deleted from the registry.
    #[error("room {0} is closed")]
    Closed(RoomId),
}
