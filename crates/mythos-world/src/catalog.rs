//! `RoomCatalog`: the room map loaded once at startup into a `papaya::HashMap`
//! for lock-free O(1) lookup from many concurrent reader tasks.

use crate::room::Room;
use mythos_common::RoomId;
use std::sync::Arc;

#[derive(Default)]
pub struct RoomCatalog {
    rooms: papaya::HashMap<RoomId, Arc<Room>>,
}

impl RoomCatalog {
    pub fn new() -> Self {
        Self {
            rooms: papaya::HashMap::new(),
        }
    }

    /// Populates the catalog from a fully-built room set. Rooms are never
    /// added or removed after startup.
    pub fn load(rooms: Vec<Room>) -> Self {
        let catalog = Self::new();
        {
            let guard = catalog.rooms.guard();
            for room in rooms {
                catalog.rooms.insert(room.room_id.clone(), Arc::new(room), &guard);
            }
        }
        catalog
    }

    pub fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        let guard = self.rooms.guard();
        self.rooms.get(room_id, &guard).cloned()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.len() == 0
    }

    /// Snapshot of every room, used by zone/sub-zone membership queries
    /// that have no per-zone index of their own.
    pub fn all_rooms(&self) -> Vec<Arc<Room>> {
        let guard = self.rooms.guard();
        self.rooms.iter(&guard).map(|(_, room)| room.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_support::RecordingPublisher;
    use std::collections::HashMap;

    #[test]
    fn load_then_get_round_trips() {
        let room = Room::new(
            RoomId::new("room-1"),
            mythos_common::ZoneId::new("zone-a"),
            None,
            HashMap::new(),
            Box::new(RecordingPublisher::default()),
        );
        let catalog = RoomCatalog::load(vec![room]);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(&RoomId::new("room-1")).is_some());
        assert!(catalog.get(&RoomId::new("missing")).is_none());
    }
}
