//! Canonical, self-describing wire envelope for broker messages.
//!
//! A generated schema compiler is out of proportion to what this crate
//! needs, so the envelope is plain `rmp-serde` over a small struct instead
//! (see DESIGN.md).

use chrono::{DateTime, Utc};
use mythos_common::BrokerError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub subject: String,
    pub schema_version: u16,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl WireEnvelope {
    pub fn new(subject: &str, payload: serde_json::Value) -> Self {
        Self {
            subject: subject.to_string(),
            schema_version: SCHEMA_VERSION,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, BrokerError> {
        rmp_serde::to_vec_named(self).map_err(|e| BrokerError::Publish(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, BrokerError> {
        rmp_serde::from_slice(bytes).map_err(|e| BrokerError::Subscribe(e.to_string()))
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, BrokerError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| BrokerError::Subscribe(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_encode_decode() {
        let original = WireEnvelope::new("chat.global", json!({"text": "hello"}));
        let bytes = original.encode().unwrap();
        let decoded = WireEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded.subject, "chat.global");
        assert_eq!(decoded.schema_version, SCHEMA_VERSION);
        assert_eq!(decoded.payload, json!({"text": "hello"}));
    }
}
