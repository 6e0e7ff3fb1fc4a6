//! `Room` and its occupant-tracking operations.

use async_trait::async_trait;
use mythos_common::{PlayerId, RoomId, SubZoneId, Topic, ZoneId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Capability Room uses to announce occupant changes, injected at
/// construction so Room never imports the concrete event bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: Topic, room_id: &RoomId, player_id: Option<&PlayerId>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

#[derive(Default)]
struct Occupants {
    players: HashSet<PlayerId>,
    objects: HashSet<String>,
    npcs: HashSet<String>,
}

/// Static room data never mutates after catalog load;
/// only the occupant sets, behind their own lock, change at runtime.
pub struct Room {
    pub room_id: RoomId,
    pub zone: ZoneId,
    pub sub_zone: Option<SubZoneId>,
    pub exits: HashMap<Direction, RoomId>,
    occupants: Mutex<Occupants>,
    publisher: Box<dyn EventPublisher>,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        zone: ZoneId,
        sub_zone: Option<SubZoneId>,
        exits: HashMap<Direction, RoomId>,
        publisher: Box<dyn EventPublisher>,
    ) -> Self {
        Self {
            room_id,
            zone,
            sub_zone,
            exits,
            occupants: Mutex::new(Occupants::default()),
            publisher,
        }
    }

    /// No-op (and no event) when the player is already present.
    pub async fn player_entered(&self, player_id: PlayerId) {
        let inserted = self.occupants.lock().unwrap().players.insert(player_id);
        if inserted {
            self.publisher
                .publish(Topic::PlayerEnteredRoom, &self.room_id, Some(&player_id))
                .await;
        }
    }

    pub async fn player_left(&self, player_id: PlayerId) {
        let removed = self.occupants.lock().unwrap().players.remove(&player_id);
        if removed {
            self.publisher
                .publish(Topic::PlayerLeftRoom, &self.room_id, Some(&player_id))
                .await;
        }
    }

    pub async fn npc_entered(&self, npc_id: String) {
        let inserted = self.occupants.lock().unwrap().npcs.insert(npc_id);
        if inserted {
            self.publisher.publish(Topic::NpcEnteredRoom, &self.room_id, None).await;
        }
    }

    pub async fn npc_left(&self, npc_id: String) {
        let removed = self.occupants.lock().unwrap().npcs.remove(&npc_id);
        if removed {
            self.publisher.publish(Topic::NpcLeftRoom, &self.room_id, None).await;
        }
    }

    pub async fn object_added(&self, object_id: String) {
        let inserted = self.occupants.lock().unwrap().objects.insert(object_id);
        if inserted {
            self.publisher.publish(Topic::ObjectAdded, &self.room_id, None).await;
        }
    }

    pub async fn object_removed(&self, object_id: String) {
        let removed = self.occupants.lock().unwrap().objects.remove(&object_id);
        if removed {
            self.publisher.publish(Topic::ObjectRemoved, &self.room_id, None).await;
        }
    }

    pub fn occupants(&self) -> Vec<PlayerId> {
        self.occupants.lock().unwrap().players.iter().copied().collect()
    }

    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.occupants.lock().unwrap().players.contains(player_id)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    pub struct RecordingPublisher {
        pub events: TokioMutex<Vec<(Topic, RoomId, Option<PlayerId>)>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: Topic, room_id: &RoomId, player_id: Option<&PlayerId>) {
            self.events
                .lock()
                .await
                .push((topic, room_id.clone(), player_id.copied()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingPublisher;
    use super::*;
    use mythos_common::PlayerId;
    use std::sync::Arc;

    fn test_room(publisher: Box<dyn EventPublisher>) -> Room {
        Room::new(
            RoomId::new("room-1"),
            ZoneId::new("zone-a"),
            None,
            HashMap::new(),
            publisher,
        )
    }

    #[tokio::test]
    async fn double_entry_is_idempotent_and_emits_no_second_event() {
        let publisher = Arc::new(RecordingPublisher::default());
        let room = test_room(Box::new(NoopForward(publisher.clone())));
        let player = PlayerId::new();

        room.player_entered(player).await;
        room.player_entered(player).await;

        assert_eq!(room.occupants(), vec![player]);
        let events = publisher.events.lock().await;
        assert_eq!(events.iter().filter(|(t, ..)| *t == Topic::PlayerEnteredRoom).count(), 1);
    }

    #[tokio::test]
    async fn player_left_is_idempotent() {
        let publisher = Arc::new(RecordingPublisher::default());
        let room = test_room(Box::new(NoopForward(publisher.clone())));
        let player = PlayerId::new();

        room.player_entered(player).await;
        room.player_left(player).await;
        room.player_left(player).await;

        assert!(room.occupants().is_empty());
        let events = publisher.events.lock().await;
        assert_eq!(events.iter().filter(|(t, ..)| *t == Topic::PlayerLeftRoom).count(), 1);
    }

    struct NoopForward(Arc<RecordingPublisher>);

    #[async_trait]
    impl EventPublisher for NoopForward {
        async fn publish(&self, topic: Topic, room_id: &RoomId, player_id: Option<&PlayerId>) {
            self.0.publish(topic, room_id, player_id).await;
        }
    }
}
