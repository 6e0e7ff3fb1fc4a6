//! `ConnectionManager`: the single authority over which connections map to
//! which players, and the only component allowed to write connection
//! state.
//!
//! Depends only on `mythos-common` plus the two injected capability traits
//! below — never on `mythos-world` or `mythos-events` concretely, so the
//! daemon binary is free to wire whatever room/event backend it has
//! without this crate knowing about rooms or topics.

use crate::close_code::CloseReason;
use crate::connection::{Connection, ConnectionKind};
use crate::session::{wait_for_grace_expiry, Session, SessionState};
use async_trait::async_trait;
use dashmap::DashMap;
use mythos_common::metrics::names;
use mythos_common::{AttachError, ConnectionId, Envelope, PlayerId, RoomId, SessionId, SubZoneId, ZoneId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{info, warn};

/// Emits presence to the rest of the game. Implemented by the daemon
/// binary on top of `mythos-events`' `EventBus`.
#[async_trait]
pub trait PresenceSink: Send + Sync {
    async fn player_connected(&self, player_id: PlayerId);
    async fn player_disconnected(&self, player_id: PlayerId, reason: CloseReason);
}

/// Resolves room/zone membership for broadcast fan-out without this crate
/// depending on `mythos-world`'s `RoomCatalog` concretely.
#[async_trait]
pub trait OccupancyView: Send + Sync {
    async fn players_in_room(&self, room_id: &RoomId) -> Vec<PlayerId>;
    async fn players_in_zone(&self, zone_id: &ZoneId) -> Vec<PlayerId>;
    async fn players_in_sub_zone(&self, sub_zone_id: &SubZoneId) -> Vec<PlayerId>;
}

struct PlayerConnState {
    session: Arc<Session>,
    connections: Vec<Arc<Connection>>,
}

pub struct ConnectionManagerConfig {
    pub outbound_queue_size: usize,
    pub login_grace: Duration,
    pub disconnect_grace: Duration,
    pub max_connections_per_player: usize,
    pub stale_idle_threshold: Duration,
    pub max_connection_age: Duration,
    pub cleanup_interval: Duration,
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            outbound_queue_size: 256,
            login_grace: Duration::from_secs(5),
            disconnect_grace: Duration::from_secs(30),
            max_connections_per_player: 4,
            stale_idle_threshold: Duration::from_secs(90),
            max_connection_age: Duration::from_secs(60 * 60 * 12),
            cleanup_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionManagerStats {
    pub players_online: usize,
    pub total_connections: usize,
}

pub struct ConnectionManager {
    players: DashMap<PlayerId, RwLock<PlayerConnState>>,
    config: ConnectionManagerConfig,
    presence: Arc<dyn PresenceSink>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionManagerConfig, presence: Arc<dyn PresenceSink>) -> Self {
        Self {
            players: DashMap::new(),
            config,
            presence,
        }
    }

    /// The session id currently associated with the player, if any. Callers
    /// at the transport boundary compare this against a client-supplied
    /// session id to decide between `attach` (same session, reconnecting)
    /// and `attach_exclusive` (a different session taking over).
    pub async fn current_session_id(&self, player_id: PlayerId) -> Option<SessionId> {
        let entry = self.players.get(&player_id)?;
        let state = entry.read().await;
        Some(state.session.session_id)
    }

    /// A fresh attach for a player with no existing session starts a new
    /// one; an attach for a player who already has a session hands the
    /// connection to it. Rejects the attach once the player already holds
    /// `max_connections_per_player` open connections.
    pub async fn attach(
        &self,
        player_id: PlayerId,
        kind: ConnectionKind,
    ) -> Result<Arc<Connection>, AttachError> {
        if let Some(entry) = self.players.get(&player_id) {
            let mut state = entry.write().await;
            if state.connections.len() >= self.config.max_connections_per_player {
                return Err(AttachError::MaxConnectionsExceeded);
            }
            let connection = Arc::new(Connection::new(
                player_id,
                kind,
                state.session.session_id,
                self.config.outbound_queue_size,
            ));
            connection.mark_open();
            if state.session.state() == SessionState::Grace {
                state.session.reattach();
            }
            state.connections.push(connection.clone());
            metrics::counter!(names::CONN_ATTACHED_TOTAL).increment(1);
            return Ok(connection);
        }

        let session = Arc::new(Session::new(player_id));
        let connection = Arc::new(Connection::new(
            player_id,
            kind,
            session.session_id,
            self.config.outbound_queue_size,
        ));
        connection.mark_open();
        self.players.insert(
            player_id,
            RwLock::new(PlayerConnState {
                session: session.clone(),
                connections: vec![connection.clone()],
            }),
        );
        metrics::counter!(names::CONN_ATTACHED_TOTAL).increment(1);

        let login_grace = self.config.login_grace;
        let session_for_promote = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(login_grace).await;
            session_for_promote.promote_to_online();
        });
        self.presence.player_connected(player_id).await;

        Ok(connection)
    }

    /// Handles a concurrent-attach/session-conflict: closes every
    /// connection belonging to the player's previous session before the
    /// new session's connection is installed, with no extra presence
    /// events emitted.
    pub async fn attach_exclusive(
        &self,
        player_id: PlayerId,
        kind: ConnectionKind,
        reason: CloseReason,
    ) -> Result<Arc<Connection>, AttachError> {
        if let Some(entry) = self.players.get(&player_id) {
            let mut state = entry.write().await;
            for stale in state.connections.drain(..) {
                Self::close_connection(&stale, reason).await;
            }
            let new_session = Arc::new(Session::new(player_id));
            new_session.promote_to_online();
            let connection = Arc::new(Connection::new(
                player_id,
                kind,
                new_session.session_id,
                self.config.outbound_queue_size,
            ));
            connection.mark_open();
            state.session = new_session;
            state.connections.push(connection.clone());
            metrics::counter!(names::CONN_ATTACHED_TOTAL).increment(1);
            return Ok(connection);
        }
        self.attach(player_id, kind).await
    }

    /// Removes a connection from its player. If that was the player's last
    /// connection the session enters its disconnect grace window; grace
    /// expiry is what actually emits the disconnect presence event.
    pub async fn detach(&self, player_id: PlayerId, connection_id: ConnectionId, reason: CloseReason) {
        let Some(entry) = self.players.get(&player_id) else {
            return;
        };
        let (became_empty, session, generation) = {
            let mut state = entry.write().await;
            if let Some(pos) = state.connections.iter().position(|c| c.connection_id == connection_id) {
                let connection = state.connections.remove(pos);
                Self::close_connection(&connection, reason).await;
            }
            metrics::counter!(names::CONN_DETACHED_TOTAL).increment(1);
            let became_empty = state.connections.is_empty();
            let generation = if became_empty { state.session.enter_grace() } else { 0 };
            (became_empty, state.session.clone(), generation)
        };
        drop(entry);

        if !became_empty {
            return;
        }

        let disconnect_grace = self.config.disconnect_grace;
        let presence = self.presence.clone();
        let session_for_wait = session.clone();
        tokio::spawn(async move {
            let expired = wait_for_grace_expiry(&session_for_wait, generation, disconnect_grace).await;
            if expired {
                session_for_wait.mark_offline();
                presence.player_disconnected(player_id, reason).await;
            }
        });
    }

    pub async fn force_disconnect_player(&self, player_id: PlayerId, reason: CloseReason) {
        if let Some(entry) = self.players.get(&player_id) {
            let mut state = entry.write().await;
            for connection in state.connections.drain(..) {
                Self::close_connection(&connection, reason).await;
            }
            state.session.enter_grace();
        }
    }

    pub async fn send_to_player(&self, player_id: PlayerId, envelope: Envelope) {
        let Some(entry) = self.players.get(&player_id) else {
            return;
        };
        let state = entry.read().await;
        for connection in state.connections.iter().filter(|c| c.is_open()) {
            if connection.outbound.enqueue(envelope.clone()).await.is_err() {
                warn!(%player_id, "slow consumer, closing connection");
                Self::close_connection(connection, CloseReason::SlowConsumer).await;
            }
        }
    }

    pub async fn broadcast_to_players(&self, player_ids: &[PlayerId], envelope: Envelope) {
        for player_id in player_ids {
            self.send_to_player(*player_id, envelope.clone()).await;
        }
    }

    pub async fn stats(&self) -> ConnectionManagerStats {
        let mut total_connections = 0;
        for entry in self.players.iter() {
            total_connections += entry.value().read().await.connections.len();
        }
        ConnectionManagerStats {
            players_online: self.players.len(),
            total_connections,
        }
    }

    /// Every player with at least one open connection, for fan-out that
    /// ignores room/zone membership.
    pub fn connected_player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|entry| *entry.key()).collect()
    }

    /// Spawns the periodic sweep that prunes stale-idle connections and
    /// recycles ones past `max_connection_age`, run on `cleanup_interval`.
    /// The caller (`Services::build`) owns the returned handle's lifetime.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let interval = manager.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.sweep_once().await;
            }
        })
    }

    /// One sweep pass: every open connection past `max_connection_age` is
    /// recycled, and every open connection idle past `stale_idle_threshold`
    /// (and not already caught by the age check) is pruned.
    async fn sweep_once(&self) {
        let mut to_detach: Vec<(PlayerId, ConnectionId, CloseReason)> = Vec::new();

        for entry in self.players.iter() {
            let player_id = *entry.key();
            let state = entry.value().read().await;
            for connection in state.connections.iter() {
                if !connection.is_open() {
                    continue;
                }
                if connection.age() >= self.config.max_connection_age {
                    to_detach.push((player_id, connection.connection_id, CloseReason::ConnectionTimeout));
                } else if connection.idle_for() >= self.config.stale_idle_threshold {
                    to_detach.push((player_id, connection.connection_id, CloseReason::StalePrune));
                }
            }
        }

        for (player_id, connection_id, reason) in to_detach {
            info!(%player_id, %connection_id, %reason, "sweep pruning connection");
            self.detach(player_id, connection_id, reason).await;
        }
    }

    async fn close_connection(connection: &Connection, reason: CloseReason) {
        if connection.transition_to_closing() {
            info!(connection_id = %connection.connection_id, %reason, "closing connection");
            connection.mark_closed();
            connection.outbound.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingPresence {
        connected: AtomicUsize,
        disconnected: AtomicUsize,
    }

    #[async_trait]
    impl PresenceSink for RecordingPresence {
        async fn player_connected(&self, _player_id: PlayerId) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }
        async fn player_disconnected(&self, _player_id: PlayerId, _reason: CloseReason) {
            self.disconnected.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(presence: Arc<RecordingPresence>) -> ConnectionManager {
        ConnectionManager::new(
            ConnectionManagerConfig {
                outbound_queue_size: 4,
                login_grace: Duration::from_millis(5),
                disconnect_grace: Duration::from_millis(20),
                max_connections_per_player: 4,
                stale_idle_threshold: Duration::from_secs(90),
                max_connection_age: Duration::from_secs(60 * 60 * 12),
                cleanup_interval: Duration::from_secs(15),
            },
            presence,
        )
    }

    #[tokio::test]
    async fn detach_last_connection_waits_out_grace_before_emitting_presence() {
        let presence = Arc::new(RecordingPresence::default());
        let manager = manager(presence.clone());
        let player = PlayerId::new();

        let connection = manager.attach(player, ConnectionKind::WebSocket).await.unwrap();
        assert_eq!(presence.connected.load(Ordering::SeqCst), 1);

        manager.detach(player, connection.connection_id, CloseReason::Normal).await;
        assert_eq!(presence.disconnected.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(presence.disconnected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reattach_within_grace_suppresses_disconnect_presence() {
        let presence = Arc::new(RecordingPresence::default());
        let manager = manager(presence.clone());
        let player = PlayerId::new();

        let connection = manager.attach(player, ConnectionKind::WebSocket).await.unwrap();
        manager.detach(player, connection.connection_id, CloseReason::Normal).await;

        manager.attach(player, ConnectionKind::WebSocket).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(presence.disconnected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn attach_exclusive_closes_prior_connections_without_extra_presence() {
        let presence = Arc::new(RecordingPresence::default());
        let manager = manager(presence.clone());
        let player = PlayerId::new();

        let first = manager.attach(player, ConnectionKind::WebSocket).await.unwrap();
        let second = manager
            .attach_exclusive(player, ConnectionKind::WebSocket, CloseReason::NewGameSession)
            .await
            .unwrap();

        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(presence.connected.load(Ordering::SeqCst), 1);
        assert_eq!(presence.disconnected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn attach_rejects_past_the_per_player_connection_cap() {
        let presence = Arc::new(RecordingPresence::default());
        let config = ConnectionManagerConfig {
            outbound_queue_size: 4,
            login_grace: Duration::from_millis(5),
            disconnect_grace: Duration::from_millis(20),
            max_connections_per_player: 2,
            stale_idle_threshold: Duration::from_secs(90),
            max_connection_age: Duration::from_secs(60 * 60 * 12),
            cleanup_interval: Duration::from_secs(15),
        };
        let manager = ConnectionManager::new(config, presence);
        let player = PlayerId::new();

        manager.attach(player, ConnectionKind::WebSocket).await.unwrap();
        manager.attach(player, ConnectionKind::WebSocket).await.unwrap();

        let result = manager.attach(player, ConnectionKind::WebSocket).await;
        assert!(matches!(result, Err(AttachError::MaxConnectionsExceeded)));
    }

    #[tokio::test]
    async fn current_session_id_tracks_the_active_session() {
        let presence = Arc::new(RecordingPresence::default());
        let manager = manager(presence);
        let player = PlayerId::new();

        assert_eq!(manager.current_session_id(player).await, None);

        let connection = manager.attach(player, ConnectionKind::WebSocket).await.unwrap();
        assert_eq!(manager.current_session_id(player).await, Some(connection.session_id));
    }

    #[tokio::test]
    async fn sweep_prunes_connections_idle_past_the_stale_threshold() {
        let presence = Arc::new(RecordingPresence::default());
        let manager = Arc::new(ConnectionManager::new(
            ConnectionManagerConfig {
                outbound_queue_size: 4,
                login_grace: Duration::from_millis(1),
                disconnect_grace: Duration::from_millis(20),
                max_connections_per_player: 4,
                stale_idle_threshold: Duration::from_millis(10),
                max_connection_age: Duration::from_secs(60 * 60 * 12),
                cleanup_interval: Duration::from_secs(15),
            },
            presence,
        ));
        let player = PlayerId::new();
        let connection = manager.attach(player, ConnectionKind::WebSocket).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.sweep_once().await;

        assert!(!connection.is_open());
    }
}
