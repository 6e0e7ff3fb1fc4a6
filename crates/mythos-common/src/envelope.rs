//! The outbound message object delivered to a connection.
//!
//! Opaque to the Connection Manager: it is produced by the real-time
//! handlers and only ever read by transport write loops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an envelope may be dropped under backpressure.
///
/// Critical envelopes (disconnect notices, session-replacement notices) are
/// never dropped; if they cannot be enqueued the connection is closed
/// instead (`slow_consumer`), per the outbound-queue overflow policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    Normal,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event_id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub server_timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub priority: Priority,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            server_timestamp: Utc::now(),
            priority: Priority::Normal,
        }
    }

    pub fn critical(mut self) -> Self {
        self.priority = Priority::Critical;
        self
    }

    pub fn is_critical(&self) -> bool {
        matches!(self.priority, Priority::Critical)
    }
}

/// Inbound frame shape accepted on the WebSocket endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Command { data: serde_json::Value },
    Ping { data: serde_json::Value },
    Ack { data: serde_json::Value },
}

/// Outbound frame shape for both the WebSocket and SSE transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    GameEvent {
        data: serde_json::Value,
        server_ts: DateTime<Utc>,
    },
    Chat {
        data: serde_json::Value,
        server_ts: DateTime<Utc>,
    },
    System {
        data: serde_json::Value,
        server_ts: DateTime<Utc>,
    },
    Pong {
        data: serde_json::Value,
        server_ts: DateTime<Utc>,
    },
    Error {
        data: serde_json::Value,
        server_ts: DateTime<Utc>,
    },
}

impl From<Envelope> for OutboundFrame {
    fn from(env: Envelope) -> Self {
        let server_ts = env.server_timestamp;
        match env.topic.as_str() {
            "chat" => OutboundFrame::Chat {
                data: env.payload,
                server_ts,
            },
            "system" => OutboundFrame::System {
                data: env.payload,
                server_ts,
            },
            "pong" => OutboundFrame::Pong {
                data: env.payload,
                server_ts,
            },
            "error" => OutboundFrame::Error {
                data: env.payload,
                server_ts,
            },
            _ => OutboundFrame::GameEvent {
                data: env.payload,
                server_ts,
            },
        }
    }
}
