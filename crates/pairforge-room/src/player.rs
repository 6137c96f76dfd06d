//! The player record.

use pairforge_protocol::PlayerId;
use pairforge_transport::ConnectionId;

/// A connected player: an allocated id and the connection it arrived on.
///
/// Immutable once created. The connection itself stays owned by its
/// session; the player only carries its id, so copies held by the
/// registry and by rooms never keep a socket alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    connection: ConnectionId,
}

impl Player {
    pub fn new(id: PlayerId, connection: ConnectionId) -> Self {
        Self { id, connection }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }
}
