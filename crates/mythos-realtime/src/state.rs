//! Shared state handed to every axum handler.

use crate::auth::SessionAuthenticator;
use mythos_broker::BrokerClient;
use mythos_common::{AttachError, PlayerId, SessionId};
use mythos_connections::{CloseReason, Connection, ConnectionKind, ConnectionManager};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub broker: Arc<BrokerClient>,
    pub started_at: Instant,
}

impl AppState {
    /// Resolves a client-presented session id against the player's current
    /// session. A matching session id is a reconnect of the same login and
    /// gets a plain `attach`; anything else (including a first-ever attach)
    /// is either a genuinely new session or one superseding an existing
    /// one, so a mismatch tears down the prior session's connections via
    /// `attach_exclusive` before installing the new one.
    pub async fn attach_for_session(
        &self,
        player_id: PlayerId,
        session_id: SessionId,
        kind: ConnectionKind,
    ) -> Result<Arc<Connection>, AttachError> {
        match self.connections.current_session_id(player_id).await {
            Some(current) if current == session_id => self.connections.attach(player_id, kind).await,
            Some(_) => {
                self.connections
                    .attach_exclusive(player_id, kind, CloseReason::NewGameSession)
                    .await
            }
            None => self.connections.attach(player_id, kind).await,
        }
    }
}
