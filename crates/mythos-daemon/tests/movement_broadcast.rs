//! Drives the basic movement/broadcast path end to end: attach three
//! players' connections, move one between rooms, and check that occupants
//! of the old and new room receive the right envelopes while the mover
//! gets a personalized arrival message.

use mythos_common::{MythosConfig, PlayerId, RoomId};
use mythos_connections::ConnectionKind;
use mythos_daemon::services::Services;
use std::time::Duration;
use tokio::time::timeout;

async fn next_envelope(connection: &mythos_connections::Connection) -> Option<mythos_common::Envelope> {
    timeout(Duration::from_secs(2), connection.outbound.dequeue()).await.ok().flatten()
}

#[tokio::test]
async fn moving_a_player_notifies_both_rooms_and_the_mover() {
    let services = Services::build(MythosConfig::development()).await;

    let square = RoomId::new("town-square");
    let market = RoomId::new("market-street");

    let mover = PlayerId::new();
    let bystander_in_square = PlayerId::new();
    let bystander_in_market = PlayerId::new();

    services.players.register(mover, square.clone());
    services.players.register(bystander_in_square, square.clone());
    services.players.register(bystander_in_market, market.clone());

    services.catalog.get(&square).unwrap().player_entered(mover).await;
    services.catalog.get(&square).unwrap().player_entered(bystander_in_square).await;
    services.catalog.get(&market).unwrap().player_entered(bystander_in_market).await;

    let mover_conn = services.connections.attach(mover, ConnectionKind::WebSocket).await.unwrap();
    let square_conn = services
        .connections
        .attach(bystander_in_square, ConnectionKind::WebSocket)
        .await
        .unwrap();
    let market_conn = services
        .connections
        .attach(bystander_in_market, ConnectionKind::WebSocket)
        .await
        .unwrap();

    // Drain the player_connected presence envelopes fired by attach() above.
    let _ = next_envelope(&square_conn).await;
    let _ = next_envelope(&market_conn).await;

    services
        .movement
        .move_player(mover, &square, &market)
        .await
        .expect("move succeeds");

    let left_envelope = next_envelope(&square_conn).await.expect("bystander in old room is notified");
    assert_eq!(left_envelope.topic, "player_left_room");

    let entered_envelope = next_envelope(&market_conn).await.expect("bystander in new room is notified");
    assert_eq!(entered_envelope.topic, "player_entered_room");

    let personalized = next_envelope(&mover_conn).await.expect("mover gets a personalized arrival message");
    assert_eq!(personalized.topic, "player_entered_room");
    assert_eq!(
        personalized.payload.get("you_arrive_in").and_then(|v| v.as_str()),
        Some("market-street")
    );
}
