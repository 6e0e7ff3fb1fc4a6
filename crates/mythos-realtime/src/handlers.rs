//! Real-time handlers: the only place that translates bus events into
//! connection-manager calls. Contains no game logic of its own.

use async_trait::async_trait;
use mythos_common::{Envelope, PlayerId};
use mythos_connections::{ConnectionManager, OccupancyView};
use mythos_events::{Event, EventHandler, Topic};
use std::sync::Arc;
use tracing::warn;

pub struct RealTimeHandlers {
    connections: Arc<ConnectionManager>,
    occupancy: Arc<dyn OccupancyView>,
}

impl RealTimeHandlers {
    pub fn new(connections: Arc<ConnectionManager>, occupancy: Arc<dyn OccupancyView>) -> Self {
        Self { connections, occupancy }
    }

    /// Subscribes this handler to every topic it has a rule for. Call once
    /// at startup against the shared `EventBus`.
    pub async fn register(self: &Arc<Self>, bus: &mythos_events::EventBus) {
        for topic in [
            Topic::PlayerEnteredRoom,
            Topic::PlayerLeftRoom,
            Topic::ChatMessage,
            Topic::PlayerConnected,
            Topic::PlayerDisconnected,
            Topic::AdminBroadcast,
        ] {
            bus.subscribe(topic, self.clone()).await;
        }
    }

    async fn broadcast_room_except(&self, room_id: &mythos_common::RoomId, except: PlayerId, envelope: Envelope) {
        let recipients: Vec<PlayerId> = self
            .occupancy
            .players_in_room(room_id)
            .await
            .into_iter()
            .filter(|p| *p != except)
            .collect();
        self.connections.broadcast_to_players(&recipients, envelope).await;
    }

    async fn broadcast_room(&self, room_id: &mythos_common::RoomId, envelope: Envelope) {
        let recipients = self.occupancy.players_in_room(room_id).await;
        self.connections.broadcast_to_players(&recipients, envelope).await;
    }

    async fn on_player_entered_room(&self, event: &Event) {
        let (Some(room_id), Some(mover)) = (&event.room_id, event.player_id) else {
            warn!("player_entered_room event missing room_id/player_id");
            return;
        };
        let arrival = Envelope::new("player_entered_room", event.data.clone());
        self.broadcast_room_except(room_id, mover, arrival).await;

        let personalized = Envelope::new(
            "player_entered_room",
            serde_json::json!({ "you_arrive_in": room_id.as_str() }),
        );
        self.connections.send_to_player(mover, personalized).await;
    }

    async fn on_player_left_room(&self, event: &Event) {
        let (Some(room_id), Some(mover)) = (&event.room_id, event.player_id) else {
            warn!("player_left_room event missing room_id/player_id");
            return;
        };
        let envelope = Envelope::new("player_left_room", event.data.clone());
        self.broadcast_room_except(room_id, mover, envelope).await;
    }

    async fn on_chat_message(&self, event: &Event) {
        let channel = event.data.get("channel").and_then(|v| v.as_str()).unwrap_or("say");
        let envelope = Envelope::new("chat_message", event.data.clone());

        match channel {
            "say" | "local" => {
                let Some(room_id) = &event.room_id else {
                    warn!(channel, "chat message missing room_id");
                    return;
                };
                self.broadcast_room(room_id, envelope).await;
            }
            "zone" => {
                let Some(zone_id) = &event.zone_id else {
                    warn!("zone chat message missing zone_id");
                    return;
                };
                let recipients = self.occupancy.players_in_zone(zone_id).await;
                self.connections.broadcast_to_players(&recipients, envelope).await;
            }
            "subzone" => {
                let Some(sub_zone_id) = &event.sub_zone_id else {
                    warn!("subzone chat message missing sub_zone_id");
                    return;
                };
                let recipients = self.occupancy.players_in_sub_zone(sub_zone_id).await;
                self.connections.broadcast_to_players(&recipients, envelope).await;
            }
            "whisper" => {
                let Some(target) = event.data.get("target_player_id").and_then(|v| v.as_str()) else {
                    warn!("whisper chat message missing target_player_id");
                    return;
                };
                let Ok(target_uuid) = uuid::Uuid::parse_str(target) else {
                    warn!(target, "whisper target_player_id is not a valid uuid");
                    return;
                };
                let target_player = PlayerId::from(target_uuid);
                self.connections.send_to_player(target_player, envelope.clone()).await;
                if let Some(sender) = event.player_id {
                    self.connections.send_to_player(sender, envelope).await;
                }
            }
            "global" => {
                let recipients = self.connections.connected_player_ids();
                self.connections.broadcast_to_players(&recipients, envelope).await;
            }
            other => warn!(channel = other, "unknown chat channel"),
        }
    }

    async fn on_presence(&self, topic_name: &str, event: &Event) {
        let (Some(room_id), Some(player_id)) = (&event.room_id, event.player_id) else {
            return;
        };
        let envelope = Envelope::new(topic_name, event.data.clone()).critical();
        self.broadcast_room_except(room_id, player_id, envelope).await;
    }

    async fn on_admin_broadcast(&self, event: &Event) {
        let envelope = Envelope::new("admin_broadcast", event.data.clone()).critical();
        let recipients = self.connections.connected_player_ids();
        self.connections.broadcast_to_players(&recipients, envelope).await;
    }
}

#[async_trait]
impl EventHandler for RealTimeHandlers {
    async fn handle(&self, event: &Event) -> Result<(), String> {
        match event.topic {
            Topic::PlayerEnteredRoom => self.on_player_entered_room(event).await,
            Topic::PlayerLeftRoom => self.on_player_left_room(event).await,
            Topic::ChatMessage => self.on_chat_message(event).await,
            Topic::PlayerConnected => self.on_presence("player_connected", event).await,
            Topic::PlayerDisconnected => self.on_presence("player_disconnected", event).await,
            Topic::AdminBroadcast => self.on_admin_broadcast(event).await,
            _ => {}
        }
        Ok(())
    }
}
