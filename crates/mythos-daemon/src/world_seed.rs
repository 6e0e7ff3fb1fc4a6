//! A small fixed room set the process starts with. Room *persistence* and
//! authoring tooling are out of scope; some rooms must
//! exist for movement and chat to have anywhere to happen, so this module
//! seeds a handful of connected rooms the way a test fixture would.

use mythos_common::{PlayerId, RoomId, Topic, ZoneId};
use mythos_events::{Event, EventBus};
use mythos_world::room::{Direction, EventPublisher};
use mythos_world::Room;
use std::collections::HashMap;
use std::sync::Arc;

/// Forwards `Room` occupant-change callbacks onto the event bus.
struct BusEventPublisher {
    bus: Arc<EventBus>,
}

#[async_trait::async_trait]
impl EventPublisher for BusEventPublisher {
    async fn publish(&self, topic: Topic, room_id: &RoomId, player_id: Option<&PlayerId>) {
        let mut event = Event::new(topic, serde_json::json!({})).with_room(room_id.clone());
        if let Some(player_id) = player_id {
            event = event.with_player(*player_id);
        }
        self.bus.publish(event).await;
    }
}

pub fn seed_rooms(bus: Arc<EventBus>) -> Vec<Room> {
    let zone = ZoneId::new("town");
    let names = ["town-square", "market-street", "temple-steps", "east-gate"];

    let mut rooms = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let mut exits = HashMap::new();
        if i + 1 < names.len() {
            exits.insert(Direction::East, RoomId::new(names[i + 1]));
        }
        if i > 0 {
            exits.insert(Direction::West, RoomId::new(names[i - 1]));
        }

        rooms.push(Room::new(
            RoomId::new(*name),
            zone.clone(),
            None,
            exits,
            Box::new(BusEventPublisher { bus: bus.clone() }),
        ));
    }
    rooms
}
