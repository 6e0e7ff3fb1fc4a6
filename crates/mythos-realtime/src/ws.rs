//! WebSocket endpoint: `GET /ws/{player_id}?session_id=<sid>`.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use mythos_common::{AttachError, InboundFrame, OutboundFrame, PlayerId, SessionId};
use mythos_connections::{CloseReason, Connection, ConnectionKind};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub(crate) session_id: uuid::Uuid,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(player_id): Path<uuid::Uuid>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let player_id = PlayerId::from(player_id);
    let session_id = SessionId::from(query.session_id);

    match state.authenticator.authenticate(player_id, session_id, &headers).await {
        Ok(_) => {}
        Err(()) => return StatusCode::UNAUTHORIZED.into_response(),
    }

    let connection = match state
        .attach_for_session(player_id, session_id, ConnectionKind::WebSocket)
        .await
    {
        Ok(connection) => connection,
        Err(AttachError::MaxConnectionsExceeded) => return StatusCode::TOO_MANY_REQUESTS.into_response(),
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, player_id, connection))
}

async fn handle_socket(socket: WebSocket, state: AppState, player_id: PlayerId, connection: Arc<Connection>) {
    info!(%player_id, connection_id = %connection.connection_id, "websocket attached");

    let (mut sender, mut receiver) = socket.split();

    let reason = loop {
        tokio::select! {
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        connection.touch();
                        match serde_json::from_str::<InboundFrame>(&text) {
                            Ok(InboundFrame::Ping { .. }) | Ok(InboundFrame::Ack { .. }) => {}
                            Ok(InboundFrame::Command { .. }) => {
                                debug!(%player_id, "command frame received, dispatch is out of scope here");
                            }
                            Err(_) => break CloseReason::ProtocolError,
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => connection.touch(),
                    Some(Ok(Message::Close(_))) | None => break CloseReason::Normal,
                    Some(Ok(Message::Binary(_))) => {}
                    Some(Err(_)) => break CloseReason::TransportError,
                }
            }
            envelope = connection.outbound.dequeue() => {
                let Some(envelope) = envelope else {
                    break CloseReason::Shutdown;
                };
                let frame = OutboundFrame::from(envelope);
                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break CloseReason::TransportError;
                }
            }
        }
    };

    let _ = sender.close().await;
    state.connections.detach(player_id, connection.connection_id, reason).await;
}
