//! Periodic ping and consecutive-failure tracking, feeding `GET /health/detailed`.

use crate::transport::BrokerTransport;
use mythos_common::metrics::names;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct HealthState {
    last_probe_ok: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl HealthState {
    /// `true` only if the *last* probe succeeded.
    pub fn is_connected(&self) -> bool {
        self.last_probe_ok.load(Ordering::SeqCst)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    fn record(&self, ok: bool) {
        self.last_probe_ok.store(ok, Ordering::SeqCst);
        if ok {
            self.consecutive_failures.store(0, Ordering::SeqCst);
        } else {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
            metrics::gauge!(names::BROKER_CONSECUTIVE_HEALTH_FAILURES).set(failures as f64);
        }
    }
}

pub fn spawn_health_monitor(
    transport: Arc<dyn BrokerTransport>,
    interval: Duration,
    cancel: CancellationToken,
) -> Arc<HealthState> {
    let state = Arc::new(HealthState::default());
    let monitored_state = state.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let ok = transport.ping().await.is_ok();
                    monitored_state.record(ok);
                }
            }
        }
    });

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_consecutive_failures_and_resets_on_success() {
        let state = HealthState::default();
        state.record(false);
        state.record(false);
        assert_eq!(state.consecutive_failures(), 2);
        assert!(!state.is_connected());

        state.record(true);
        assert_eq!(state.consecutive_failures(), 0);
        assert!(state.is_connected());
    }
}
