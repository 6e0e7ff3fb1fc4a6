//! Inbound subscription loop: one `tmq::subscribe::Subscribe` socket per
//! subscription, decoding `WireEnvelope`s and dispatching to the registered
//! handler.

use crate::codec::WireEnvelope;
use crate::subject::Subject;
use async_trait::async_trait;
use futures_util::StreamExt;
use mythos_common::BrokerError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[async_trait]
pub trait SubscriptionHandler: Send + Sync {
    async fn handle(&self, envelope: WireEnvelope) -> Result<(), String>;
}

/// Handle returned by `BrokerClient::subscribe`, used only to stop the
/// background receive loop.
pub struct SubscriptionGuard {
    cancel: CancellationToken,
}

impl SubscriptionGuard {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

pub fn spawn_subscription(
    endpoint: String,
    pattern: Subject,
    handler: Arc<dyn SubscriptionHandler>,
) -> Result<SubscriptionGuard, BrokerError> {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        let ctx = tmq::Context::new();
        let sub = match tmq::subscribe(&ctx).connect(&endpoint) {
            Ok(sub) => sub,
            Err(e) => {
                error!(error = %e, "broker subscription failed to connect");
                return;
            }
        };
        let mut sub = match sub.subscribe(b"") {
            Ok(sub) => sub,
            Err(e) => {
                error!(error = %e, "broker subscription failed to subscribe");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => return,
                next = sub.next() => {
                    let Some(Ok(mut parts)) = next else {
                        warn!("broker subscription stream ended");
                        return;
                    };
                    if parts.len() != 2 {
                        continue;
                    }
                    let (subject_bytes, payload) = (parts.pop_front().unwrap(), parts.pop_front().unwrap());
                    let subject_str = String::from_utf8_lossy(&subject_bytes).to_string();
                    let Ok(subject) = Subject::parse(&subject_str) else {
                        continue;
                    };
                    if !subject.matches(&pattern) {
                        continue;
                    }
                    match WireEnvelope::decode(&payload) {
                        Ok(envelope) => {
                            if let Err(err) = handler.handle(envelope).await {
                                error!(subject = %subject_str, error = %err, "subscription handler failed");
                            }
                        }
                        Err(err) => {
                            warn!(subject = %subject_str, error = %err, "could not decode broker message");
                        }
                    }
                }
            }
        }
    });

    Ok(SubscriptionGuard { cancel })
}
