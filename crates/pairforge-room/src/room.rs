//! A room: a bounded, lock-guarded set of players.
//!
//! A room never removes itself from the registry. It reports when it has
//! become empty and the registry deletes it in the same critical section.

use std::future::Future;
use std::net::SocketAddr;

use pairforge_protocol::{PlayerId, RoomId};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell, watch};

use crate::{Player, ROOM_CAPACITY};

/// Outcome of [`Room::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// A member with the given id was found and removed.
    pub removed: bool,
    /// The room has no members after the call.
    pub now_empty: bool,
}

/// A snapshot of a room's membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub capacity: usize,
    /// Member ids in join order.
    pub members: Vec<PlayerId>,
}

impl RoomInfo {
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }
}

/// A game session holding up to `capacity` players.
pub struct Room {
    id: RoomId,
    capacity: usize,
    members: Mutex<Vec<Player>>,
    /// Address of the room's own endpoint, bound at most once.
    endpoint: OnceCell<SocketAddr>,
    closed: watch::Sender<bool>,
}

impl Room {
    /// Creates an empty room with the default capacity of two.
    pub fn new(id: RoomId) -> Self {
        Self::with_capacity(id, ROOM_CAPACITY)
    }

    /// Creates an empty room holding up to `capacity` players.
    pub fn with_capacity(id: RoomId, capacity: usize) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id,
            capacity,
            members: Mutex::new(Vec::with_capacity(capacity)),
            endpoint: OnceCell::new(),
            closed,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds `player` if a slot is free.
    ///
    /// Returns `false` without touching membership when the room is full
    /// or already holds a player with the same id. Check and append happen
    /// under one lock acquisition, so two callers racing for the last slot
    /// cannot both succeed.
    pub async fn try_add(&self, player: Player) -> bool {
        let mut members = self.members.lock().await;
        if members.len() >= self.capacity
            || members.iter().any(|m| m.id() == player.id())
        {
            return false;
        }
        members.push(player);
        true
    }

    /// Removes the first member with id `player_id`.
    ///
    /// Removing a non-member is a no-op (`removed == false`).
    pub async fn remove(&self, player_id: PlayerId) -> Removal {
        let mut members = self.members.lock().await;
        let removed = match members.iter().position(|m| m.id() == player_id) {
            Some(idx) => {
                members.remove(idx);
                true
            }
            None => false,
        };
        Removal {
            removed,
            now_empty: members.is_empty(),
        }
    }

    /// Returns the current members in join order.
    pub async fn members(&self) -> Vec<Player> {
        self.members.lock().await.clone()
    }

    pub async fn contains(&self, player_id: PlayerId) -> bool {
        self.members
            .lock()
            .await
            .iter()
            .any(|m| m.id() == player_id)
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    pub async fn is_full(&self) -> bool {
        self.members.lock().await.len() >= self.capacity
    }

    /// Returns a snapshot of the room's membership.
    pub async fn info(&self) -> RoomInfo {
        let members = self.members.lock().await;
        RoomInfo {
            room_id: self.id,
            capacity: self.capacity,
            members: members.iter().map(Player::id).collect(),
        }
    }

    /// Returns the endpoint address, if one has been bound.
    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint.get().copied()
    }

    /// Returns the endpoint address, running `init` to bind it if this is
    /// the first request. Concurrent callers wait for the single `init` in
    /// flight; if it fails, the next caller tries again.
    pub async fn endpoint_or_try_init<F, Fut, E>(
        &self,
        init: F,
    ) -> Result<SocketAddr, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SocketAddr, E>>,
    {
        self.endpoint.get_or_try_init(init).await.copied()
    }

    /// Marks the room as deleted. Idempotent.
    pub(crate) fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Returns `true` once the registry has deleted this room.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Completes once the room has been deleted.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("endpoint", &self.endpoint())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
