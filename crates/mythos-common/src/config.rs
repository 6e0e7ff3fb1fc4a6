//! The single configuration record carrying every runtime tunable for the
//! real-time core.

use figment::providers::{Env, Format, Json, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MythosConfig {
    // Connection Manager
    pub max_connections_per_player: usize,
    #[serde(with = "duration_secs")]
    pub connection_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub max_connection_age: Duration,
    #[serde(with = "duration_secs")]
    pub login_grace_period: Duration,
    #[serde(with = "duration_secs")]
    pub disconnect_grace_period: Duration,
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
    #[serde(with = "duration_secs")]
    pub stale_idle_threshold: Duration,
    pub outbound_queue_size: usize,

    // Event Bus
    pub event_bus_queue_size: usize,
    #[serde(with = "duration_millis")]
    pub high_priority_publish_timeout: Duration,

    // Broker
    pub broker_url: String,
    pub broker_pool_size: usize,
    pub max_batch_retries: u32,
    #[serde(with = "duration_millis")]
    pub batch_flush_ms: Duration,
    pub batch_flush_size: usize,
    pub enable_subject_validation: bool,
    pub strict_subject_validation: bool,
    pub enable_message_validation: bool,
    pub manual_ack: bool,

    // Health
    #[serde(with = "duration_secs")]
    pub health_check_interval: Duration,

    // Transport
    pub listen_address: String,
}

impl Default for MythosConfig {
    fn default() -> Self {
        Self {
            max_connections_per_player: 4,
            connection_timeout: secs(90),
            max_connection_age: secs(60 * 60 * 12),
            login_grace_period: secs(5),
            disconnect_grace_period: secs(30),
            cleanup_interval: secs(15),
            stale_idle_threshold: secs(90),
            outbound_queue_size: 256,

            event_bus_queue_size: 8192,
            high_priority_publish_timeout: millis(100),

            broker_url: "tcp://127.0.0.1:4223".to_string(),
            broker_pool_size: 4,
            max_batch_retries: 5,
            batch_flush_ms: millis(250),
            batch_flush_size: 64,
            enable_subject_validation: true,
            strict_subject_validation: true,
            enable_message_validation: true,
            manual_ack: false,

            health_check_interval: secs(10),

            listen_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl MythosConfig {
    /// Local/dev preset: a longer stale-idle threshold.
    pub fn development() -> Self {
        Self {
            stale_idle_threshold: secs(5 * 60),
            ..Self::default()
        }
    }

    /// Load defaults, then overlay an optional config file, then environment
    /// variables prefixed `MYTHOS_`.
    pub fn load(config_file: Option<&std::path::Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Json::file(path)),
            };
        }

        figment = figment.merge(Env::prefixed("MYTHOS_"));
        figment.extract()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_documented_values() {
        let cfg = MythosConfig::default();
        assert_eq!(cfg.max_connections_per_player, 4);
        assert_eq!(cfg.disconnect_grace_period, secs(30));
        assert_eq!(cfg.login_grace_period, secs(5));
        assert_eq!(cfg.stale_idle_threshold, secs(90));
    }

    #[test]
    fn development_preset_relaxes_idle_threshold() {
        let cfg = MythosConfig::development();
        assert_eq!(cfg.stale_idle_threshold, secs(5 * 60));
    }

    #[test]
    fn load_without_file_returns_defaults() {
        let cfg = MythosConfig::load(None).unwrap();
        assert_eq!(cfg.outbound_queue_size, 256);
    }

    #[test]
    fn load_overlays_a_yaml_file_on_top_of_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mythos.yaml");
        std::fs::write(&path, "max_connections_per_player: 9\nbroker_pool_size: 2\n").unwrap();

        let cfg = MythosConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.max_connections_per_player, 9);
        assert_eq!(cfg.broker_pool_size, 2);
        // Fields absent from the file keep their defaults.
        assert_eq!(cfg.outbound_queue_size, 256);
    }

    #[test]
    fn load_overlays_env_vars_on_top_of_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mythos.json");
        std::fs::write(&path, r#"{"broker_pool_size": 2}"#).unwrap();

        std::env::set_var("MYTHOS_BROKER_POOL_SIZE", "7");
        let cfg = MythosConfig::load(Some(&path)).unwrap();
        std::env::remove_var("MYTHOS_BROKER_POOL_SIZE");

        assert_eq!(cfg.broker_pool_size, 7);
    }
}
