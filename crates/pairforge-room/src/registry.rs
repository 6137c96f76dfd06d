//! The matchmaking registry: owns every open room and every registered
//! player, and keeps the two lists consistent.

use std::sync::Arc;

use pairforge_protocol::{PlayerId, RoomId};
use tokio::sync::Mutex;

use crate::{IdAllocator, Player, Room, RoomConfig, RoomError, RoomInfo};

/// Where [`MatchmakingRegistry::register`] put a player.
#[derive(Debug, Clone)]
pub struct Placement {
    pub room: Arc<Room>,
    /// `true` if the room was opened for this player.
    pub created: bool,
}

/// What [`MatchmakingRegistry::unregister`] cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unregistered {
    /// The player was present in the player list.
    pub was_registered: bool,
    /// Rooms deleted because the player was their last member.
    pub deleted_rooms: Vec<RoomId>,
}

struct RegistryState {
    /// Open rooms in creation order. Never holds an empty room.
    rooms: Vec<Arc<Room>>,
    /// Registered players in registration order. Ids are unique.
    players: Vec<Player>,
}

/// Matches players into rooms and tears rooms down when they empty.
///
/// Every mutating operation runs start to finish under the registry lock,
/// so registrations and unregistrations are totally ordered. Room locks
/// are only taken while the registry lock is held, in that order.
///
/// Invariant: every player in the player list is a member of exactly one
/// room in the room list, and every listed room has at least one member.
pub struct MatchmakingRegistry {
    config: RoomConfig,
    room_ids: IdAllocator<RoomId>,
    state: Mutex<RegistryState>,
}

impl MatchmakingRegistry {
    /// Creates an empty registry whose room ids start at 0.
    pub fn new(config: RoomConfig) -> Self {
        Self::with_allocator(config, IdAllocator::new())
    }

    /// Creates an empty registry that draws room ids from `room_ids`.
    pub fn with_allocator(config: RoomConfig, room_ids: IdAllocator<RoomId>) -> Self {
        Self {
            config,
            room_ids,
            state: Mutex::new(RegistryState {
                rooms: Vec::new(),
                players: Vec::new(),
            }),
        }
    }

    /// Capacity of the rooms this registry creates.
    pub fn capacity(&self) -> usize {
        self.config.effective_capacity()
    }

    /// Registers `player` and places it in a room.
    ///
    /// Rooms are scanned in creation order and the player joins the first
    /// one with a free slot. When none has room, a new room is created and
    /// appended. Placing the player and listing it happen in the same
    /// critical section, so no observer sees a registered player without
    /// a room.
    ///
    /// The player is listed only after it holds a slot, with no await in
    /// between. Dropping this future part-way therefore never leaves a
    /// listed player without a room.
    ///
    /// # Errors
    /// Returns [`RoomError::AlreadyRegistered`] if a player with the same
    /// id is already registered. Nothing is changed in that case.
    pub async fn register(&self, player: Player) -> Result<Placement, RoomError> {
        let player_id = player.id();
        let mut state = self.state.lock().await;

        if state.players.iter().any(|p| p.id() == player_id) {
            return Err(RoomError::AlreadyRegistered(player_id));
        }

        let mut joined = None;
        for room in &state.rooms {
            if room.try_add(player).await {
                joined = Some(Arc::clone(room));
                break;
            }
        }
        if let Some(room) = joined {
            state.players.push(player);
            tracing::info!(
                %player_id,
                room_id = %room.id(),
                created = false,
                "player placed"
            );
            return Ok(Placement {
                room,
                created: false,
            });
        }

        let room = Arc::new(Room::with_capacity(
            self.room_ids.next(),
            self.capacity(),
        ));
        // A fresh room has at least one free slot.
        let added = room.try_add(player).await;
        debug_assert!(added, "fresh room rejected its first player");
        state.rooms.push(Arc::clone(&room));
        state.players.push(player);

        tracing::info!(
            %player_id,
            room_id = %room.id(),
            created = true,
            rooms = state.rooms.len(),
            "player placed"
        );
        Ok(Placement { room, created: true })
    }

    /// Removes the player from the player list and from every room that
    /// holds it, deleting rooms that become empty.
    ///
    /// Every room is visited, not just the first match, so a player that
    /// somehow ended up in two rooms is cleaned from both. Unknown players
    /// are tolerated: calling this twice is harmless.
    pub async fn unregister(&self, player_id: PlayerId) -> Unregistered {
        let mut state = self.state.lock().await;

        let was_registered =
            match state.players.iter().position(|p| p.id() == player_id) {
                Some(idx) => {
                    state.players.remove(idx);
                    true
                }
                None => false,
            };

        let mut deleted_rooms = Vec::new();
        // Reverse order keeps the remaining indices valid while deleting.
        for idx in (0..state.rooms.len()).rev() {
            let removal = state.rooms[idx].remove(player_id).await;
            if removal.removed {
                tracing::info!(
                    %player_id,
                    room_id = %state.rooms[idx].id(),
                    "player removed from room"
                );
            }
            if removal.now_empty {
                let room = state.rooms.remove(idx);
                room.close();
                tracing::info!(room_id = %room.id(), "room deleted");
                deleted_rooms.push(room.id());
            }
        }

        if !was_registered {
            tracing::debug!(%player_id, "unregister for unknown player");
        }

        Unregistered {
            was_registered,
            deleted_rooms,
        }
    }

    /// Number of open rooms.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }

    /// Number of registered players.
    pub async fn player_count(&self) -> usize {
        self.state.lock().await.players.len()
    }

    /// Registered player ids in registration order.
    pub async fn player_ids(&self) -> Vec<PlayerId> {
        self.state
            .lock()
            .await
            .players
            .iter()
            .map(Player::id)
            .collect()
    }

    /// Snapshots of every open room, in creation order.
    pub async fn rooms(&self) -> Vec<RoomInfo> {
        let state = self.state.lock().await;
        let mut infos = Vec::with_capacity(state.rooms.len());
        for room in &state.rooms {
            infos.push(room.info().await);
        }
        infos
    }

    /// Returns the first open room that holds `player_id`.
    pub async fn room_of(&self, player_id: PlayerId) -> Option<Arc<Room>> {
        let state = self.state.lock().await;
        for room in &state.rooms {
            if room.contains(player_id).await {
                return Some(Arc::clone(room));
            }
        }
        None
    }
}

impl Default for MatchmakingRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
