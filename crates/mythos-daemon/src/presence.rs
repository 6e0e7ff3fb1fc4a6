//! Bridges `ConnectionManager`'s `PresenceSink` callbacks to the event bus
//! and the room model.

use async_trait::async_trait;
use mythos_common::{PlayerId, Topic};
use mythos_connections::{CloseReason, PresenceSink};
use mythos_events::{Event, EventBus};
use mythos_world::{PlayerRegistry, RoomCatalog};
use std::sync::Arc;
use tracing::warn;

pub struct BusPresenceSink {
    bus: Arc<EventBus>,
    catalog: Arc<RoomCatalog>,
    players: Arc<PlayerRegistry>,
}

impl BusPresenceSink {
    pub fn new(bus: Arc<EventBus>, catalog: Arc<RoomCatalog>, players: Arc<PlayerRegistry>) -> Self {
        Self { bus, catalog, players }
    }
}

#[async_trait]
impl PresenceSink for BusPresenceSink {
    async fn player_connected(&self, player_id: PlayerId) {
        let room_id = match self.players.lock_handle(&player_id) {
            Some(handle) => handle.lock().await.current_room_id.clone(),
            None => None,
        };
        let event = Event::new(Topic::PlayerConnected, serde_json::json!({ "player_id": player_id.to_string() }))
            .with_player(player_id);
        let event = match room_id {
            Some(room_id) => event.with_room(room_id),
            None => event,
        };
        self.bus.publish(event).await;
    }

    async fn player_disconnected(&self, player_id: PlayerId, reason: CloseReason) {
        let Some(handle) = self.players.lock_handle(&player_id) else {
            warn!(%player_id, "player_disconnected presence fired with no registered player state");
            return;
        };
        let room_id = handle.lock().await.current_room_id.clone();

        if let Some(room_id) = &room_id {
            if let Some(room) = self.catalog.get(room_id) {
                room.player_left(player_id).await;
            }
        }

        let event = Event::new(
            Topic::PlayerDisconnected,
            serde_json::json!({ "player_id": player_id.to_string(), "reason": reason.as_str() }),
        )
        .with_player(player_id);
        let event = match room_id {
            Some(room_id) => event.with_room(room_id),
            None => event,
        };
        self.bus.publish(event).await;

        self.players.unregister(&player_id);
    }
}
