//! The `Event` type published on the in-process bus.

use chrono::{DateTime, Utc};
use mythos_common::topic::{EventPriority, Topic};
use mythos_common::{CorrelationId, PlayerId, RoomId, SubZoneId, ZoneId};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub player_id: Option<PlayerId>,
    pub room_id: Option<RoomId>,
    pub zone_id: Option<ZoneId>,
    pub sub_zone_id: Option<SubZoneId>,
    pub data: serde_json::Value,
    /// Wall-clock timestamp; crosses process boundaries when an event is
    /// mirrored to the broker.
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<CorrelationId>,
    /// Monotonic timestamp for in-process latency measurement only.
    #[serde(skip, default = "Instant::now")]
    pub recorded_at: Instant,
    #[serde(skip, default)]
    pub priority: EventPriority,
}

impl Event {
    pub fn new(topic: Topic, data: serde_json::Value) -> Self {
        let priority = topic.default_priority();
        Self {
            topic,
            player_id: None,
            room_id: None,
            zone_id: None,
            sub_zone_id: None,
            data,
            timestamp: Utc::now(),
            correlation_id: None,
            recorded_at: Instant::now(),
            priority,
        }
    }

    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_zone(mut self, zone_id: ZoneId, sub_zone_id: Option<SubZoneId>) -> Self {
        self.zone_id = Some(zone_id);
        self.sub_zone_id = sub_zone_id;
        self
    }

    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}
