//! Per-player location and movement-eligibility tracking, addressed through
//! its own player lock.

use mythos_common::{PlayerId, RoomId};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct PlayerState {
    pub current_room_id: Option<RoomId>,
    /// e.g. dead or stunned.
    pub movement_forbidden: bool,
}

#[derive(Default)]
pub struct PlayerRegistry {
    players: papaya::HashMap<PlayerId, Arc<Mutex<PlayerState>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: papaya::HashMap::new(),
        }
    }

    /// Places a player in a room without going through the movement
    /// service, for initial login placement.
    pub fn register(&self, player_id: PlayerId, room_id: RoomId) {
        let guard = self.players.guard();
        self.players.insert(
            player_id,
            Arc::new(Mutex::new(PlayerState {
                current_room_id: Some(room_id),
                movement_forbidden: false,
            })),
            &guard,
        );
    }

    pub fn unregister(&self, player_id: &PlayerId) {
        let guard = self.players.guard();
        self.players.remove(player_id, &guard);
    }

    pub fn lock_handle(&self, player_id: &PlayerId) -> Option<Arc<Mutex<PlayerState>>> {
        let guard = self.players.guard();
        self.players.get(player_id, &guard).cloned()
    }

    pub fn set_movement_forbidden(&self, player_id: &PlayerId, forbidden: bool) {
        if let Some(handle) = self.lock_handle(player_id) {
            if let Ok(mut state) = handle.try_lock() {
                state.movement_forbidden = forbidden;
            }
        }
    }
}
