//! Rooms and matchmaking for Pairforge.
//!
//! Players are placed into rooms of fixed capacity by first-fit
//! matchmaking, and rooms are deleted the moment their last member leaves.
//!
//! # Key types
//!
//! - [`IdAllocator`] — process-unique, strictly increasing identifiers
//! - [`Player`] — an allocated id paired with its connection
//! - [`Room`] — a bounded membership set behind its own lock
//! - [`MatchmakingRegistry`] — owns the room list and player list
//!
//! # Locking
//!
//! Two tiers: the registry lock guards the room and player lists as a
//! unit, and each room guards its own membership. The registry lock is
//! always acquired before any room lock it touches, never the reverse.
//! Code holding only a room lock must not wait on the registry.

mod config;
mod error;
mod ids;
mod player;
mod registry;
mod room;

pub use config::{ROOM_CAPACITY, RoomConfig};
pub use error::RoomError;
pub use ids::IdAllocator;
pub use player::Player;
pub use registry::{MatchmakingRegistry, Placement, Unregistered};
pub use room::{Removal, Room, RoomInfo};
