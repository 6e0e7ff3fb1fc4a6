//! Subject-addressed pub/sub client for the external message broker.
//! ZeroMQ PUB/SUB is the wire transport; the envelope format and subject
//! grammar are this crate's own.

pub mod ack;
pub mod batch;
pub mod client;
pub mod codec;
pub mod health;
pub mod pool;
pub mod subject;
pub mod subscribe;
pub mod transport;

pub use ack::{AckMode, Delivery};
pub use batch::FailedBatchQueue;
pub use client::BrokerClient;
pub use codec::WireEnvelope;
pub use subject::Subject;
pub use subscribe::{SubscriptionGuard, SubscriptionHandler};
pub use transport::BrokerTransport;
