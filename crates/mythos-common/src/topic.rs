//! The closed set of in-process event topics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dispatch priority for a topic's events on the in-process bus: movement and disconnect topics block a publisher briefly
/// rather than being silently dropped under backpressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPriority {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    PlayerEnteredRoom,
    PlayerLeftRoom,
    ChatMessage,
    PlayerConnected,
    PlayerDisconnected,
    NpcEnteredRoom,
    NpcLeftRoom,
    ObjectAdded,
    ObjectRemoved,
    HpChanged,
    XpChanged,
    AdminBroadcast,
    System,
}

impl Topic {
    pub const ALL: &'static [Topic] = &[
        Topic::PlayerEnteredRoom,
        Topic::PlayerLeftRoom,
        Topic::ChatMessage,
        Topic::PlayerConnected,
        Topic::PlayerDisconnected,
        Topic::NpcEnteredRoom,
        Topic::NpcLeftRoom,
        Topic::ObjectAdded,
        Topic::ObjectRemoved,
        Topic::HpChanged,
        Topic::XpChanged,
        Topic::AdminBroadcast,
        Topic::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::PlayerEnteredRoom => "player_entered_room",
            Topic::PlayerLeftRoom => "player_left_room",
            Topic::ChatMessage => "chat_message",
            Topic::PlayerConnected => "player_connected",
            Topic::PlayerDisconnected => "player_disconnected",
            Topic::NpcEnteredRoom => "npc_entered_room",
            Topic::NpcLeftRoom => "npc_left_room",
            Topic::ObjectAdded => "object_added",
            Topic::ObjectRemoved => "object_removed",
            Topic::HpChanged => "hp_changed",
            Topic::XpChanged => "xp_changed",
            Topic::AdminBroadcast => "admin_broadcast",
            Topic::System => "system",
        }
    }

    /// Movement and disconnect topics are high priority for event-bus
    /// backpressure purposes.
    pub fn default_priority(&self) -> EventPriority {
        match self {
            Topic::PlayerEnteredRoom | Topic::PlayerLeftRoom | Topic::PlayerDisconnected => {
                EventPriority::High
            }
            _ => EventPriority::Normal,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
