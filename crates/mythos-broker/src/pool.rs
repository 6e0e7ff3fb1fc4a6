//! Connection pool with tolerant partial initialization.

use crate::transport::BrokerTransport;
use mythos_common::metrics::names;
use std::sync::Arc;

pub struct PoolStatus {
    pub successful: usize,
    pub failed: usize,
}

pub struct ConnectionPool {
    conns: Vec<Arc<dyn BrokerTransport>>,
    status: PoolStatus,
}

impl ConnectionPool {
    /// Attempts to connect `size` transports, keeping whichever succeed.
    /// A pool with zero successful connections is still returned; callers
    /// check `status()` / `is_empty()` rather than treating this as fatal.
    pub async fn init<F>(size: usize, make_transport: F) -> Self
    where
        F: Fn() -> Arc<dyn BrokerTransport>,
    {
        let mut conns = Vec::with_capacity(size);
        let mut successful = 0;
        let mut failed = 0;

        for _ in 0..size {
            let transport = make_transport();
            match transport.connect().await {
                Ok(()) => {
                    conns.push(transport);
                    successful += 1;
                }
                Err(_) => failed += 1,
            }
        }

        metrics::gauge!(names::BROKER_POOL_SUCCESSFUL).set(successful as f64);
        metrics::gauge!(names::BROKER_POOL_FAILED).set(failed as f64);

        Self {
            conns,
            status: PoolStatus { successful, failed },
        }
    }

    pub fn status(&self) -> &PoolStatus {
        &self.status
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Simple round-robin-free pick: callers that don't need affinity just
    /// take the first live connection.
    pub fn pick(&self) -> Option<&Arc<dyn BrokerTransport>> {
        self.conns.first()
    }

    pub fn all(&self) -> &[Arc<dyn BrokerTransport>] {
        &self.conns
    }
}
