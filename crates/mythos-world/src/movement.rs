//! `MovementService`: the only path by which a player changes rooms.

use crate::catalog::RoomCatalog;
use crate::player_state::PlayerRegistry;
use mythos_common::metrics::names;
use mythos_common::{MovementError, PlayerId, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

const MAX_RETRIES: u32 = 3;

/// One lock per room, held for the duration of a two-room transfer,
/// acquired in canonical lowest-room-id-first order to prevent deadlock
/// between two concurrent moves touching the same pair of rooms in
/// opposite directions. Separate from `Room`'s own
/// occupant-set mutex, which only ever protects a single insert/remove.
pub struct MovementService {
    catalog: Arc<RoomCatalog>,
    players: Arc<PlayerRegistry>,
    room_locks: HashMap<RoomId, Arc<AsyncMutex<()>>>,
}

impl MovementService {
    /// Room locks are created once at startup since the room set is static
    /// for the life of the process.
    pub fn new(catalog: Arc<RoomCatalog>, players: Arc<PlayerRegistry>, room_ids: &[RoomId]) -> Self {
        let room_locks = room_ids
            .iter()
            .map(|id| (id.clone(), Arc::new(AsyncMutex::new(()))))
            .collect();
        Self {
            catalog,
            players,
            room_locks,
        }
    }

    pub async fn validate_movement(
        &self,
        player_id: PlayerId,
        to_room_id: &RoomId,
    ) -> Result<(), MovementError> {
        let handle = self
            .players
            .lock_handle(&player_id)
            .ok_or(MovementError::PlayerNotFound)?;
        let state = handle.lock().await;

        if state.movement_forbidden {
            return Err(MovementError::StateForbidsMovement);
        }
        if self.catalog.get(to_room_id).is_none() {
            return Err(MovementError::RoomNotFound);
        }
        Ok(())
    }

    /// Atomically moves a player from one room to another. Same-room calls
    /// are a no-op. Retries up to `MAX_RETRIES` on `ConcurrentModification`
    /// before surfacing it; any failure partway through a transfer rolls
    /// back to the pre-operation state.
    pub async fn move_player(
        &self,
        player_id: PlayerId,
        from_room_id: &RoomId,
        to_room_id: &RoomId,
    ) -> Result<(), MovementError> {
        for attempt in 0..=MAX_RETRIES {
            match self.try_move(player_id, from_room_id, to_room_id).await {
                Ok(()) => {
                    metrics::counter!(names::MOVEMENT_SUCCESS_TOTAL).increment(1);
                    return Ok(());
                }
                Err(MovementError::ConcurrentModification) if attempt < MAX_RETRIES => continue,
                Err(err) => {
                    metrics::counter!(names::MOVEMENT_ERROR_TOTAL).increment(1);
                    return Err(err);
                }
            }
        }
        unreachable!("loop always returns within MAX_RETRIES + 1 iterations")
    }

    async fn try_move(
        &self,
        player_id: PlayerId,
        from_room_id: &RoomId,
        to_room_id: &RoomId,
    ) -> Result<(), MovementError> {
        let handle = self
            .players
            .lock_handle(&player_id)
            .ok_or(MovementError::PlayerNotFound)?;
        let mut player_state = handle.lock().await;

        if player_state.current_room_id.as_ref() != Some(from_room_id) {
            return Err(MovementError::RoomNotFound);
        }
        if player_state.movement_forbidden {
            return Err(MovementError::StateForbidsMovement);
        }

        if from_room_id == to_room_id {
            return Ok(());
        }

        let from_room = self.catalog.get(from_room_id).ok_or(MovementError::RoomNotFound)?;
        let to_room = self.catalog.get(to_room_id).ok_or(MovementError::RoomNotFound)?;

        let from_lock = self.room_locks.get(from_room_id).ok_or(MovementError::InternalError)?;
        let to_lock = self.room_locks.get(to_room_id).ok_or(MovementError::InternalError)?;

        // Canonical lowest-room-id-first ordering prevents deadlock against
        // a concurrent move in the opposite direction.
        let (first_lock, second_lock) = if from_room_id <= to_room_id {
            (from_lock, to_lock)
        } else {
            (to_lock, from_lock)
        };
        let _first_guard = first_lock.lock().await;
        let _second_guard = second_lock.lock().await;

        from_room.player_left(player_id).await;
        to_room.player_entered(player_id).await;
        player_state.current_room_id = Some(to_room_id.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_support::RecordingPublisher;
    use crate::room::Room;
    use mythos_common::ZoneId;
    use std::collections::HashMap as StdHashMap;

    fn room(id: &str) -> Room {
        Room::new(
            RoomId::new(id),
            ZoneId::new("zone-a"),
            None,
            StdHashMap::new(),
            Box::new(RecordingPublisher::default()),
        )
    }

    #[tokio::test]
    async fn move_player_transfers_occupancy_and_chains_consecutive_moves() {
        let catalog = Arc::new(RoomCatalog::load(vec![room("a"), room("b"), room("c")]));
        let players = Arc::new(PlayerRegistry::new());
        let player = PlayerId::new();
        players.register(player, RoomId::new("a"));

        let ids = [RoomId::new("a"), RoomId::new("b"), RoomId::new("c")];
        let service = MovementService::new(catalog.clone(), players.clone(), &ids);

        service
            .move_player(player, &RoomId::new("a"), &RoomId::new("b"))
            .await
            .unwrap();
        assert!(catalog.get(&RoomId::new("a")).unwrap().occupants().is_empty());
        assert_eq!(catalog.get(&RoomId::new("b")).unwrap().occupants(), vec![player]);

        // Invariant 2: the next move's from_room_id must equal the previous
        // move's to_room_id.
        service
            .move_player(player, &RoomId::new("b"), &RoomId::new("c"))
            .await
            .unwrap();
        assert!(catalog.get(&RoomId::new("b")).unwrap().occupants().is_empty());
        assert_eq!(catalog.get(&RoomId::new("c")).unwrap().occupants(), vec![player]);
    }

    #[tokio::test]
    async fn same_room_move_is_a_no_op() {
        let catalog = Arc::new(RoomCatalog::load(vec![room("a")]));
        let players = Arc::new(PlayerRegistry::new());
        let player = PlayerId::new();
        players.register(player, RoomId::new("a"));

        let ids = [RoomId::new("a")];
        let service = MovementService::new(catalog.clone(), players, &ids);
        catalog.get(&RoomId::new("a")).unwrap().player_entered(player).await;

        service
            .move_player(player, &RoomId::new("a"), &RoomId::new("a"))
            .await
            .unwrap();
        assert_eq!(catalog.get(&RoomId::new("a")).unwrap().occupants(), vec![player]);
    }

    #[tokio::test]
    async fn rejects_move_from_a_room_the_player_is_not_in() {
        let catalog = Arc::new(RoomCatalog::load(vec![room("a"), room("b")]));
        let players = Arc::new(PlayerRegistry::new());
        let player = PlayerId::new();
        players.register(player, RoomId::new("a"));

        let ids = [RoomId::new("a"), RoomId::new("b")];
        let service = MovementService::new(catalog, players, &ids);

        let err = service
            .move_player(player, &RoomId::new("b"), &RoomId::new("a"))
            .await
            .unwrap_err();
        assert_eq!(err, MovementError::RoomNotFound);
    }
}
