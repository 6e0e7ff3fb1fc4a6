//! Acknowledgment modes for subscriptions.

use mythos_common::metrics::names;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Manual,
}

/// Handed to a manual-ack subscription handler alongside the decoded
/// message. Dropping without calling `ack`/`nak` leaves the message
/// unacknowledged; the broker redelivers after its visibility timeout.
pub struct Delivery {
    acked: Arc<AtomicBool>,
}

impl Delivery {
    pub fn new() -> Self {
        Self {
            acked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fails (and counts against `BROKER_ACK_FAILURE_TOTAL`) if the
    /// delivery was already acked or nak'd.
    pub fn ack(&self) -> Result<(), ()> {
        if self.acked.swap(true, Ordering::SeqCst) {
            metrics::counter!(names::BROKER_ACK_FAILURE_TOTAL).increment(1);
            return Err(());
        }
        metrics::counter!(names::BROKER_ACK_SUCCESS_TOTAL).increment(1);
        Ok(())
    }

    pub fn nak(&self) {
        if !self.acked.swap(true, Ordering::SeqCst) {
            metrics::counter!(names::BROKER_NAK_TOTAL).increment(1);
        }
    }

    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }
}

impl Default for Delivery {
    fn default() -> Self {
        Self::new()
    }
}
