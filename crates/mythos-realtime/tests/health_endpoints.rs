//! Drives the monitoring surface through real HTTP requests instead of
//! calling the handlers directly, so route wiring and response shape are
//! both covered.

use async_trait::async_trait;
use axum_test::TestServer;
use mythos_common::{MythosConfig, PlayerId};
use mythos_connections::{CloseReason, ConnectionManager, ConnectionManagerConfig, PresenceSink};
use mythos_realtime::{AllowAnyAuthenticator, AppState};
use std::sync::Arc;
use std::time::Instant;

struct NoopPresence;

#[async_trait]
impl PresenceSink for NoopPresence {
    async fn player_connected(&self, _player_id: PlayerId) {}
    async fn player_disconnected(&self, _player_id: PlayerId, _reason: CloseReason) {}
}

async fn test_app() -> TestServer {
    let config = MythosConfig::development();
    let connections = Arc::new(ConnectionManager::new(
        ConnectionManagerConfig {
            outbound_queue_size: config.outbound_queue_size,
            login_grace: config.login_grace_period,
            disconnect_grace: config.disconnect_grace_period,
            ..Default::default()
        },
        Arc::new(NoopPresence),
    ));
    let broker = Arc::new(mythos_broker::BrokerClient::connect(&config).await);
    let state = AppState {
        connections,
        authenticator: Arc::new(AllowAnyAuthenticator),
        broker,
        started_at: Instant::now(),
    };
    TestServer::new(mythos_realtime::build_router(state)).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let server = test_app().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn detailed_health_reports_every_component() {
    let server = test_app().await;
    let response = server.get("/health/detailed").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    for component in ["database", "connection_manager", "broker", "memory"] {
        assert!(body.get(component).is_some(), "missing {component} in response");
    }
}

#[tokio::test]
async fn connection_health_reports_zero_players_when_idle() {
    let server = test_app().await;
    let response = server.get("/monitoring/connection-health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["players_online"], 0);
    assert_eq!(body["total_connections"], 0);
}

#[tokio::test]
async fn performance_reports_nonzero_uptime() {
    let server = test_app().await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let response = server.get("/monitoring/performance").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["uptime_seconds"].as_u64().is_some());
}
