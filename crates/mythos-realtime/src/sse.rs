//! SSE endpoint: `GET /sse/{player_id}?session_id=<sid>`.
//! Server→client only; inbound commands arrive over HTTP POST, outside
//! this crate's scope.

use crate::state::AppState;
use crate::ws::WsQuery;
use async_stream::stream;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use mythos_common::{AttachError, OutboundFrame, PlayerId, SessionId};
use mythos_connections::{CloseReason, ConnectionKind};
use std::convert::Infallible;
use tracing::info;

pub async fn sse_handler(
    Path(player_id): Path<uuid::Uuid>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let player_id = PlayerId::from(player_id);
    let session_id = SessionId::from(query.session_id);

    if state.authenticator.authenticate(player_id, session_id, &headers).await.is_err() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let connection = match state.attach_for_session(player_id, session_id, ConnectionKind::Sse).await {
        Ok(connection) => connection,
        Err(AttachError::MaxConnectionsExceeded) => return StatusCode::TOO_MANY_REQUESTS.into_response(),
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };
    info!(%player_id, connection_id = %connection.connection_id, "sse attached");

    let connection_manager = state.connections.clone();
    let connection_id = connection.connection_id;
    let event_stream = stream! {
        loop {
            let Some(envelope) = connection.outbound.dequeue().await else {
                break;
            };
            let frame = OutboundFrame::from(envelope);
            let Ok(data) = serde_json::to_string(&frame) else {
                continue;
            };
            yield Ok::<_, Infallible>(SseEvent::default().event(sse_event_name(&frame)).data(data));
        }
        connection_manager.detach(player_id, connection_id, CloseReason::Normal).await;
    };

    Sse::new(event_stream).keep_alive(KeepAlive::default()).into_response()
}

fn sse_event_name(frame: &OutboundFrame) -> &'static str {
    match frame {
        OutboundFrame::GameEvent { .. } => "game_event",
        OutboundFrame::Chat { .. } => "chat",
        OutboundFrame::System { .. } => "system",
        OutboundFrame::Pong { .. } => "pong",
        OutboundFrame::Error { .. } => "error",
    }
}
