//! The socket layer, separated from batching/retry business logic so tests
//! can substitute an in-memory fake.

use async_trait::async_trait;
use mythos_common::BrokerError;

/// A single send of raw, already-encoded bytes to a subject.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn connect(&self) -> Result<(), BrokerError>;
    async fn publish_raw(&self, subject: &str, bytes: Vec<u8>) -> Result<(), BrokerError>;
    async fn ping(&self) -> Result<(), BrokerError>;
}

/// ZeroMQ PUB socket transport. Subscriptions are handled separately by `subscribe.rs`, since
/// a PUB socket is send-only.
pub struct ZmqTransport {
    endpoint: String,
    socket: tokio::sync::Mutex<Option<tmq::publish::Publish>>,
}

impl ZmqTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            socket: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl BrokerTransport for ZmqTransport {
    async fn connect(&self) -> Result<(), BrokerError> {
        let ctx = tmq::Context::new();
        let publish = tmq::publish(&ctx)
            .connect(&self.endpoint)
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        *self.socket.lock().await = Some(publish);
        Ok(())
    }

    // `ping` and `publish_raw` below assume `connect` has already populated
    // the socket; `BrokerClient::ensure_connected` enforces that ordering.

    async fn publish_raw(&self, subject: &str, bytes: Vec<u8>) -> Result<(), BrokerError> {
        use futures_util::SinkExt;

        let mut guard = self.socket.lock().await;
        let mut socket = guard.take().ok_or_else(|| {
            BrokerError::Publish("transport not connected".to_string())
        })?;
        let message = tmq::Multipart::from(vec![subject.as_bytes().to_vec(), bytes]);
        let result = socket.send(message).await;
        *guard = Some(socket);
        result.map_err(|e| BrokerError::Publish(e.to_string()))
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let guard = self.socket.lock().await;
        if guard.is_some() {
            Ok(())
        } else {
            Err(BrokerError::Connect("socket not established".to_string()))
        }
    }
}
