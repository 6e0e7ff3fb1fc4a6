//! `BrokerClient`: the public entry point wiring subject validation,
//! batching, the connection pool and health monitor together.

use crate::ack::AckMode;
use crate::batch::Batcher;
use crate::codec::WireEnvelope;
use crate::health::{spawn_health_monitor, HealthState};
use crate::pool::ConnectionPool;
use crate::subject::Subject;
use crate::subscribe::{spawn_subscription, SubscriptionGuard, SubscriptionHandler};
use crate::transport::{BrokerTransport, ZmqTransport};
use async_trait::async_trait;
use mythos_common::metrics::names;
use mythos_common::{BrokerError, MythosConfig};
use rand::Rng;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct BrokerClient {
    endpoint: String,
    enable_subject_validation: bool,
    strict_subject_validation: bool,
    ack_mode: AckMode,
    pool: ConnectionPool,
    batcher: Batcher,
    health: Arc<HealthState>,
    cancel: CancellationToken,
    subscriptions: std::sync::Mutex<Vec<SubscriptionGuard>>,
    pending_replies: Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>>,
    reply_subscriptions: std::sync::Mutex<HashSet<String>>,
}

/// Delivers `request()` replies: every reply subject the client has ever
/// asked for routes through one of these, keyed on the correlation id each
/// caller stamped onto its outgoing request.
struct ReplyHandler {
    pending: Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>>,
}

#[async_trait]
impl SubscriptionHandler for ReplyHandler {
    async fn handle(&self, envelope: WireEnvelope) -> Result<(), String> {
        let Some(correlation_id) = envelope.payload.get("correlation_id").and_then(|v| v.as_str()) else {
            return Ok(());
        };
        let sender = self.pending.lock().unwrap().remove(correlation_id);
        if let Some(sender) = sender {
            let reply = envelope.payload.get("payload").cloned().unwrap_or(serde_json::Value::Null);
            let _ = sender.send(reply);
        }
        Ok(())
    }
}

impl BrokerClient {
    /// Connects `config.broker_pool_size` transports, tolerating partial
    /// failure, and starts the background health monitor.
    pub async fn connect(config: &MythosConfig) -> Self {
        let endpoint = config.broker_url.clone();
        let pool = ConnectionPool::init(config.broker_pool_size, {
            let endpoint = endpoint.clone();
            move || Arc::new(ZmqTransport::new(endpoint.clone())) as Arc<dyn BrokerTransport>
        })
        .await;

        let cancel = CancellationToken::new();
        let health = if let Some(transport) = pool.pick() {
            spawn_health_monitor(transport.clone(), config.health_check_interval, cancel.clone())
        } else {
            Arc::new(HealthState::default())
        };

        Self {
            endpoint,
            enable_subject_validation: config.enable_subject_validation,
            strict_subject_validation: config.strict_subject_validation,
            ack_mode: if config.manual_ack { AckMode::Manual } else { AckMode::Auto },
            pool,
            batcher: Batcher::new(config.batch_flush_size, config.max_batch_retries),
            health,
            cancel,
            subscriptions: std::sync::Mutex::new(Vec::new()),
            pending_replies: Arc::new(std::sync::Mutex::new(HashMap::new())),
            reply_subscriptions: std::sync::Mutex::new(HashSet::new()),
        }
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    pub fn is_connected(&self) -> bool {
        self.health.is_connected()
    }

    pub fn consecutive_health_failures(&self) -> u32 {
        self.health.consecutive_failures()
    }

    pub fn pool_status(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.successful, status.failed)
    }

    /// Reconnects the pool with bounded exponential backoff and jitter.
    pub async fn reconnect(&self, config: &MythosConfig) -> Result<(), BrokerError> {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let pool = ConnectionPool::init(config.broker_pool_size, {
                let endpoint = self.endpoint.clone();
                move || Arc::new(ZmqTransport::new(endpoint.clone())) as Arc<dyn BrokerTransport>
            })
            .await;

            if !pool.is_empty() {
                return Ok(());
            }

            if backoff >= MAX_BACKOFF {
                return Err(BrokerError::Connect(format!(
                    "could not reconnect to {}",
                    self.endpoint
                )));
            }

            let jitter_ms = rand::rng().random_range(0..100);
            tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    pub fn disconnect(&self) {
        self.cancel.cancel();
        for sub in self.subscriptions.lock().unwrap().drain(..) {
            sub.cancel();
        }
    }

    /// Validates the subject, serializes the payload, and either publishes
    /// immediately or appends to the batcher depending on `batch`.
    pub async fn publish(
        &self,
        subject: &str,
        payload: serde_json::Value,
        batch: bool,
    ) -> Result<(), BrokerError> {
        let parsed = self.validate_subject(subject)?;
        let envelope = WireEnvelope::new(subject, payload);
        let Some(transport) = self.pool.pick() else {
            return Err(BrokerError::Publish("no connected broker transport".to_string()));
        };

        if batch {
            let prefix = parsed.prefix(1);
            self.batcher.enqueue(transport.as_ref(), &prefix, envelope).await;
        } else {
            let bytes = envelope.encode()?;
            let size = bytes.len();
            transport.publish_raw(subject, bytes).await?;
            metrics::counter!(names::BROKER_PUBLISH_TOTAL).increment(1);
            metrics::counter!(names::BROKER_PUBLISH_BYTES_TOTAL).increment(size as u64);
        }

        Ok(())
    }

    pub async fn flush_batches(&self) {
        if let Some(transport) = self.pool.pick() {
            self.batcher.flush_all(transport.as_ref()).await;
        }
    }

    pub async fn recover_failed_batches(&self) -> Vec<WireEnvelope> {
        self.batcher.recover_failed_batches().await
    }

    /// Validates a subscription pattern and starts a background receive
    /// loop, filtering inbound messages through `Subject::matches`.
    pub fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn SubscriptionHandler>,
    ) -> Result<(), BrokerError> {
        let parsed = self.validate_subject(pattern)?;
        let guard = spawn_subscription(self.endpoint.clone(), parsed, handler)?;
        self.subscriptions.lock().unwrap().push(guard);
        Ok(())
    }

    /// Point-to-point request/reply with a timeout.
    /// Uses the same PUB/SUB transport as NATS-style request/reply: the
    /// request is published with a correlation id and a reply-to subject
    /// stamped onto it, and a shared subscription on that reply subject
    /// resolves the matching waiter when a reply with the same correlation
    /// id comes back.
    pub async fn request(
        &self,
        subject: &str,
        payload: serde_json::Value,
        request_timeout: Duration,
    ) -> Result<serde_json::Value, BrokerError> {
        self.validate_subject(subject)?;
        let reply_subject = format!("{subject}.reply");
        self.ensure_reply_subscription(&reply_subject)?;

        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_replies.lock().unwrap().insert(correlation_id.clone(), tx);

        let envelope_payload = json!({
            "correlation_id": correlation_id,
            "reply_to": reply_subject,
            "payload": payload,
        });
        if let Err(err) = self.publish(subject, envelope_payload, false).await {
            self.pending_replies.lock().unwrap().remove(&correlation_id);
            return Err(err);
        }

        let outcome = timeout(request_timeout, rx).await;
        self.pending_replies.lock().unwrap().remove(&correlation_id);

        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BrokerError::Request("reply waiter dropped before a reply arrived".to_string())),
            Err(_) => Err(BrokerError::Timeout),
        }
    }

    /// Spawns the shared subscription backing a reply subject on first use;
    /// later requests on the same subject reuse it.
    fn ensure_reply_subscription(&self, reply_subject: &str) -> Result<(), BrokerError> {
        let mut active = self.reply_subscriptions.lock().unwrap();
        if active.contains(reply_subject) {
            return Ok(());
        }

        let parsed = self.validate_subject(reply_subject)?;
        let handler = Arc::new(ReplyHandler {
            pending: self.pending_replies.clone(),
        });
        let guard = spawn_subscription(self.endpoint.clone(), parsed, handler)?;
        self.subscriptions.lock().unwrap().push(guard);
        active.insert(reply_subject.to_string());
        Ok(())
    }

    fn validate_subject(&self, raw: &str) -> Result<Subject, BrokerError> {
        if !self.enable_subject_validation {
            return Ok(Subject::from_unchecked_tokens(raw));
        }

        let parsed = Subject::parse(raw)?;
        let in_grammar = SUBJECT_TABLE
            .iter()
            .filter_map(|p| Subject::parse(p).ok())
            .any(|pattern| parsed.matches(&pattern));
        if self.strict_subject_validation && !in_grammar {
            warn!(subject = raw, "subject outside the declared grammar");
        }
        Ok(parsed)
    }
}

/// Stable subject patterns; used only for a best-effort
/// strict-mode warning, not hard rejection, since new topics may be added
/// without a broker client release.
const SUBJECT_TABLE: &[&str] = &[
    "chat.say.room.*",
    "chat.local.room.*",
    "chat.zone.*",
    "chat.subzone.*",
    "chat.whisper.player.*",
    "chat.global",
    "events.player.>",
    "events.room.>",
    "admin.*",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reply_handler_resolves_the_waiter_matching_its_correlation_id() {
        let pending: Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>> =
            Arc::new(std::sync::Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().unwrap().insert("abc-123".to_string(), tx);

        let handler = ReplyHandler { pending: pending.clone() };
        let envelope = WireEnvelope::new(
            "chat.global.reply",
            json!({"correlation_id": "abc-123", "payload": {"ok": true}}),
        );
        handler.handle(envelope).await.unwrap();

        let reply = rx.await.unwrap();
        assert_eq!(reply, json!({"ok": true}));
        assert!(pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_handler_ignores_envelopes_with_no_matching_waiter() {
        let pending: Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>> =
            Arc::new(std::sync::Mutex::new(HashMap::new()));
        let handler = ReplyHandler { pending: pending.clone() };
        let envelope = WireEnvelope::new(
            "chat.global.reply",
            json!({"correlation_id": "nobody-waiting", "payload": {"ok": true}}),
        );
        handler.handle(envelope).await.unwrap();
        assert!(pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_handler_drops_envelopes_with_no_correlation_id() {
        let pending: Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>> =
            Arc::new(std::sync::Mutex::new(HashMap::new()));
        let (tx, _rx) = oneshot::channel();
        pending.lock().unwrap().insert("abc-123".to_string(), tx);

        let handler = ReplyHandler { pending: pending.clone() };
        let envelope = WireEnvelope::new("chat.global.reply", json!({"payload": {"ok": true}}));
        handler.handle(envelope).await.unwrap();

        assert_eq!(pending.lock().unwrap().len(), 1);
    }
}
