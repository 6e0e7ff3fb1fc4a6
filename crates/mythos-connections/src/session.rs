//! `Session`: the identity that survives across reconnects, and the
//! grace-period timers that separate a dropped connection from a departed
//! player.

use mythos_common::{PlayerId, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::Notify;
use tokio::time::{Duration, Instant};

/// `OFFLINE → PROVISIONAL_ONLINE → ONLINE → GRACE → OFFLINE`.
///
/// `PROVISIONAL_ONLINE` covers the login grace window during which a
/// half-authenticated connection has not yet sent presence to the rest of
/// the game; `GRACE` covers the disconnect grace window during which a
/// dropped connection may still reattach without the player being
/// considered to have left the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Offline,
    ProvisionalOnline,
    Online,
    Grace,
}

pub struct Session {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    state: StdMutex<SessionState>,
    generation: AtomicU64,
    reattached: Notify,
}

impl Session {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            session_id: SessionId::new(),
            player_id,
            state: StdMutex::new(SessionState::ProvisionalOnline),
            generation: AtomicU64::new(0),
            reattached: Notify::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn promote_to_online(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::ProvisionalOnline {
            *state = SessionState::Online;
        }
    }

    /// Enters the disconnect grace window. Bumps the generation counter so
    /// a previously scheduled grace-expiry task for an earlier generation
    /// no-ops instead of tearing down a session that has since reattached.
    pub fn enter_grace(&self) -> u64 {
        *self.state.lock().unwrap() = SessionState::Grace;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cancels a pending grace expiry (the player reattached in time).
    pub fn reattach(&self) {
        *self.state.lock().unwrap() = SessionState::Online;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.reattached.notify_waiters();
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn mark_offline(&self) {
        *self.state.lock().unwrap() = SessionState::Offline;
    }
}

/// Waits out a grace period, racing the wait against reattachment; returns
/// `true` if the grace period expired without the session having moved to
/// a newer generation (i.e. the caller should tear the session down).
pub async fn wait_for_grace_expiry(session: &Session, generation: u64, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return session.current_generation() == generation;
        }
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {
                return session.current_generation() == generation;
            }
            _ = session.reattached.notified() => {
                if session.current_generation() != generation {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reattach_before_deadline_cancels_expiry() {
        let session = Session::new(PlayerId::new());
        let generation = session.enter_grace();

        let session_ref = &session;
        let wait = wait_for_grace_expiry(session_ref, generation, Duration::from_millis(200));
        tokio::pin!(wait);

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.reattach();

        let expired = wait.await;
        assert!(!expired);
        assert_eq!(session.state(), SessionState::Online);
    }

    #[tokio::test]
    async fn no_reattach_expires_grace() {
        let session = Session::new(PlayerId::new());
        let generation = session.enter_grace();

        let expired = wait_for_grace_expiry(&session, generation, Duration::from_millis(20)).await;
        assert!(expired);
    }

    #[tokio::test]
    async fn stale_generation_from_an_earlier_grace_window_does_not_expire() {
        let session = Session::new(PlayerId::new());
        let stale_generation = session.enter_grace();
        session.reattach();
        let _new_generation = session.enter_grace();

        let expired =
            wait_for_grace_expiry(&session, stale_generation, Duration::from_millis(10)).await;
        assert!(!expired);
    }
}
