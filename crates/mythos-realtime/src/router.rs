//! Assembles every external-facing route onto one axum `Router`.

use crate::health::{connection_health, health, health_detailed, performance};
use crate::state::AppState;
use crate::ws::ws_handler;
use crate::sse::sse_handler;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/{player_id}", get(ws_handler))
        .route("/sse/{player_id}", get(sse_handler))
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .route("/monitoring/connection-health", get(connection_health))
        .route("/monitoring/performance", get(performance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
