//! `Connection`, its state machine, and the per-connection outbound queue.

use crate::close_code::CloseReason;
use mythos_common::metrics::names;
use mythos_common::{ConnectionId, Envelope, PlayerId, SessionId};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Mutex as StdMutex;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    WebSocket,
    Sse,
}

/// `ATTACHING → OPEN → (IDLE_WARN)? → CLOSING → CLOSED`.
/// `CLOSED` is terminal; `connection_id` is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Attaching,
    Open,
    IdleWarn,
    Closing,
    Closed,
}

/// Bounded per-connection outbound queue: when full, the oldest
/// non-critical envelope is dropped; a critical envelope that still can't
/// fit after a brief bounded wait closes the connection instead.
pub struct OutboundQueue {
    queue: Mutex<VecDeque<Envelope>>,
    capacity: usize,
    data_ready: Notify,
    space_freed: Notify,
    closed: std::sync::atomic::AtomicBool,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            data_ready: Notify::new(),
            space_freed: Notify::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Wakes any task blocked in `dequeue` so the write loop can exit once
    /// the connection has been closed, instead of waiting forever for a
    /// message that will never come.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.data_ready.notify_waiters();
    }

    /// `Ok(())` on success, `Err(())` when a critical envelope could not be
    /// enqueued even after the bounded wait — caller must close the
    /// connection with `CloseReason::SlowConsumer`.
    pub async fn enqueue(&self, envelope: Envelope) -> Result<(), ()> {
        let critical = envelope.is_critical();

        {
            let mut q = self.queue.lock().await;
            if q.len() < self.capacity {
                q.push_back(envelope);
                drop(q);
                self.data_ready.notify_one();
                return Ok(());
            }

            if !critical {
                q.pop_front();
                q.push_back(envelope);
                drop(q);
                self.data_ready.notify_one();
                metrics::counter!(names::CONN_DROPPED_MESSAGE_TOTAL).increment(1);
                return Ok(());
            }
        }

        let waited = timeout(Duration::from_millis(100), self.space_freed.notified()).await;
        let mut q = self.queue.lock().await;
        if waited.is_ok() && q.len() < self.capacity {
            q.push_back(envelope);
            drop(q);
            self.data_ready.notify_one();
            Ok(())
        } else {
            warn!("critical envelope could not be enqueued: slow consumer");
            metrics::counter!(names::CONN_SLOW_CONSUMER_TOTAL).increment(1);
            Err(())
        }
    }

    /// `None` once the queue has been closed and drained — the write loop
    /// should stop after that, not block waiting for more.
    pub async fn dequeue(&self) -> Option<Envelope> {
        loop {
            {
                let mut q = self.queue.lock().await;
                if let Some(envelope) = q.pop_front() {
                    drop(q);
                    self.space_freed.notify_one();
                    return Some(envelope);
                }
                if self.closed.load(Ordering::Relaxed) {
                    return None;
                }
            }
            // Bounded wait rather than an unconditional `.await` on
            // `notified()`: a `close()` that races ahead of this task
            // starting to wait would otherwise be missed forever, since
            // `notify_waiters` only wakes tasks already parked.
            let _ = timeout(Duration::from_millis(200), self.data_ready.notified()).await;
        }
    }
}

pub struct Connection {
    pub connection_id: ConnectionId,
    pub player_id: PlayerId,
    pub kind: ConnectionKind,
    pub session_id: SessionId,
    pub established_at: Instant,
    last_seen: StdMutex<Instant>,
    state: StdMutex<ConnectionState>,
    pub outbound: OutboundQueue,
}

impl Connection {
    pub fn new(
        player_id: PlayerId,
        kind: ConnectionKind,
        session_id: SessionId,
        outbound_queue_size: usize,
    ) -> Self {
        Self {
            connection_id: ConnectionId::new(),
            player_id,
            kind,
            session_id,
            established_at: Instant::now(),
            last_seen: StdMutex::new(Instant::now()),
            state: StdMutex::new(ConnectionState::Attaching),
            outbound: OutboundQueue::new(outbound_queue_size),
        }
    }

    pub fn mark_open(&self) {
        *self.state.lock().unwrap() = ConnectionState::Open;
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// `false` once the connection has started closing.
    pub fn is_open(&self) -> bool {
        matches!(self.state(), ConnectionState::Open | ConnectionState::IdleWarn)
    }

    pub fn transition_to_closing(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == ConnectionState::Closed || *state == ConnectionState::Closing {
            return false;
        }
        *state = ConnectionState::Closing;
        true
    }

    pub fn mark_closed(&self) {
        *self.state.lock().unwrap() = ConnectionState::Closed;
    }

    pub fn mark_idle_warn(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ConnectionState::Open {
            *state = ConnectionState::IdleWarn;
        }
    }

    /// Updated on every inbound frame, including application-level pings.
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().unwrap().elapsed()
    }

    pub fn age(&self) -> Duration {
        self.established_at.elapsed()
    }
}

#[allow(unused)]
pub(crate) fn default_close_reason_for_state_error() -> CloseReason {
    CloseReason::ProtocolError
}
