//! Batching by subject prefix with partial-flush retry and a dead-letter
//! queue.

use crate::codec::WireEnvelope;
use crate::transport::BrokerTransport;
use mythos_common::metrics::names;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

struct Group {
    pending: Vec<WireEnvelope>,
}

/// Messages that exhausted `max_batch_retries`, kept in memory for
/// operator-triggered recovery via `recover_failed_batches`.
#[derive(Default)]
pub struct FailedBatchQueue {
    inner: Mutex<Vec<WireEnvelope>>,
}

impl FailedBatchQueue {
    pub async fn push_all(&self, envelopes: Vec<WireEnvelope>) {
        if envelopes.is_empty() {
            return;
        }
        metrics::gauge!(names::BROKER_FAILED_BATCH_QUEUE_DEPTH).increment(envelopes.len() as f64);
        self.inner.lock().await.extend(envelopes);
    }

    pub async fn drain(&self) -> Vec<WireEnvelope> {
        let mut guard = self.inner.lock().await;
        let drained = std::mem::take(&mut *guard);
        metrics::gauge!(names::BROKER_FAILED_BATCH_QUEUE_DEPTH).set(0.0);
        drained
    }

    pub async fn depth(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub struct Batcher {
    groups: Mutex<HashMap<String, Group>>,
    flush_size: usize,
    max_retries: u32,
    pub failed: Arc<FailedBatchQueue>,
}

impl Batcher {
    pub fn new(flush_size: usize, max_retries: u32) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            flush_size,
            max_retries,
            failed: Arc::new(FailedBatchQueue::default()),
        }
    }

    /// Appends to the group keyed by the subject's first path component,
    /// flushing immediately if the group has reached `batch_flush_size`.
    pub async fn enqueue(
        &self,
        transport: &dyn BrokerTransport,
        prefix: &str,
        envelope: WireEnvelope,
    ) {
        let should_flush = {
            let mut groups = self.groups.lock().await;
            let group = groups
                .entry(prefix.to_string())
                .or_insert_with(|| Group { pending: Vec::new() });
            group.pending.push(envelope);
            group.pending.len() >= self.flush_size
        };

        if should_flush {
            self.flush_group(transport, prefix).await;
        }
    }

    /// Timer-driven flush of every non-empty group.
    pub async fn flush_all(&self, transport: &dyn BrokerTransport) {
        let prefixes: Vec<String> = self.groups.lock().await.keys().cloned().collect();
        for prefix in prefixes {
            self.flush_group(transport, &prefix).await;
        }
    }

    async fn flush_group(&self, transport: &dyn BrokerTransport, prefix: &str) {
        let pending = {
            let mut groups = self.groups.lock().await;
            match groups.get_mut(prefix) {
                Some(group) if !group.pending.is_empty() => std::mem::take(&mut group.pending),
                _ => return,
            }
        };

        metrics::gauge!(names::BROKER_CURRENT_BATCH_SIZE).set(pending.len() as f64);

        let mut remaining = pending;
        let mut attempt = 0u32;
        loop {
            let mut failures = Vec::new();
            for envelope in remaining.drain(..) {
                match envelope.encode() {
                    Ok(bytes) => match transport.publish_raw(&envelope.subject, bytes).await {
                        Ok(()) => {
                            metrics::counter!(names::BROKER_BATCH_FLUSH_SUCCESS_TOTAL).increment(1);
                        }
                        Err(_) => failures.push(envelope),
                    },
                    Err(_) => failures.push(envelope),
                }
            }

            if failures.is_empty() {
                break;
            }

            metrics::counter!(names::BROKER_BATCH_FLUSH_FAILURE_TOTAL).increment(1);

            if attempt >= self.max_retries {
                warn!(prefix, count = failures.len(), "batch exhausted retries, moving to dead-letter queue");
                self.failed.push_all(failures).await;
                break;
            }

            attempt += 1;
            let backoff = Duration::from_millis(200 * 2u64.pow(attempt.min(7)));
            sleep(backoff).await;
            remaining = failures;
        }

        self.groups.lock().await.remove(prefix);
    }

    pub async fn recover_failed_batches(&self) -> Vec<WireEnvelope> {
        self.failed.drain().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fakes::FakeTransport;
    use serde_json::json;

    #[tokio::test]
    async fn partial_failure_retries_only_the_failed_group() {
        let transport = FakeTransport::default();
        transport.fail_subjects.lock().unwrap().push("chat.say.room.2".to_string());
        let batcher = Batcher::new(10, 1);

        batcher
            .enqueue(&transport, "chat", WireEnvelope::new("chat.say.room.1", json!({"n": 1})))
            .await;
        batcher
            .enqueue(&transport, "chat", WireEnvelope::new("chat.say.room.2", json!({"n": 2})))
            .await;
        batcher.flush_all(&transport).await;

        let published = transport.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "chat.say.room.1");

        let failed = batcher.recover_failed_batches().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].subject, "chat.say.room.2");
    }

    #[tokio::test]
    async fn flush_triggers_at_configured_size() {
        let transport = FakeTransport::default();
        let batcher = Batcher::new(2, 3);

        batcher
            .enqueue(&transport, "chat", WireEnvelope::new("chat.global", json!({})))
            .await;
        assert!(transport.published.lock().unwrap().is_empty());

        batcher
            .enqueue(&transport, "chat", WireEnvelope::new("chat.global", json!({})))
            .await;
        assert_eq!(transport.published.lock().unwrap().len(), 2);
    }
}
