//! Room configuration.

use serde::{Deserialize, Serialize};

/// Number of players a room holds.
pub const ROOM_CAPACITY: usize = 2;

/// Configuration for rooms created by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum members per room. Values below 1 are treated as 1, so a
    /// freshly created room always accepts its first player.
    pub capacity: usize,
}

impl RoomConfig {
    pub(crate) fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: ROOM_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default_is_pairs() {
        assert_eq!(RoomConfig::default().capacity, 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = RoomConfig { capacity: 0 };
        assert_eq!(config.effective_capacity(), 1);
    }
}
