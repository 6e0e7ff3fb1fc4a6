//! The `Services` container: builds every long-lived component once and
//! hands out the `Arc` handles each consumer needs, acting as the single
//! composition root for the process.

use crate::presence::BusPresenceSink;
use crate::world_seed;
use mythos_broker::BrokerClient;
use mythos_common::MythosConfig;
use mythos_connections::{ConnectionManager, ConnectionManagerConfig};
use mythos_events::EventBus;
use mythos_realtime::{AppState, RealTimeHandlers, RoomCatalogOccupancyView};
use mythos_world::{MovementService, PlayerRegistry, RoomCatalog};
use std::sync::Arc;
use std::time::Instant;

pub struct Services {
    pub config: MythosConfig,
    pub bus: Arc<EventBus>,
    pub broker: Arc<BrokerClient>,
    pub catalog: Arc<RoomCatalog>,
    pub players: Arc<PlayerRegistry>,
    pub movement: Arc<MovementService>,
    pub connections: Arc<ConnectionManager>,
    pub handlers: Arc<RealTimeHandlers>,
    sweep_task: tokio::task::JoinHandle<()>,
}

impl Services {
    /// Builds every component in dependency order and subscribes the
    /// real-time handlers to the bus. Rooms are static for the life of the
    /// process, so they're seeded here once, after the bus they publish
    /// occupant changes through exists.
    pub async fn build(config: MythosConfig) -> Self {
        let bus = EventBus::new(config.event_bus_queue_size, config.high_priority_publish_timeout);
        let broker = Arc::new(BrokerClient::connect(&config).await);

        let rooms = world_seed::seed_rooms(bus.clone());
        let room_ids: Vec<_> = rooms.iter().map(|r| r.room_id.clone()).collect();
        let catalog = Arc::new(RoomCatalog::load(rooms));
        let players = Arc::new(PlayerRegistry::new());
        let movement = Arc::new(MovementService::new(catalog.clone(), players.clone(), &room_ids));

        let presence = Arc::new(BusPresenceSink::new(bus.clone(), catalog.clone(), players.clone()));
        let connections = Arc::new(ConnectionManager::new(
            ConnectionManagerConfig {
                outbound_queue_size: config.outbound_queue_size,
                login_grace: config.login_grace_period,
                disconnect_grace: config.disconnect_grace_period,
                max_connections_per_player: config.max_connections_per_player,
                stale_idle_threshold: config.stale_idle_threshold,
                max_connection_age: config.max_connection_age,
                cleanup_interval: config.cleanup_interval,
            },
            presence,
        ));
        let sweep_task = connections.spawn_sweep_task();

        let occupancy = Arc::new(RoomCatalogOccupancyView::new(catalog.clone()));
        let handlers = Arc::new(RealTimeHandlers::new(connections.clone(), occupancy));
        handlers.register(&bus).await;

        Self {
            config,
            bus,
            broker,
            catalog,
            players,
            movement,
            connections,
            handlers,
            sweep_task,
        }
    }

    pub fn app_state(&self, authenticator: Arc<dyn mythos_realtime::SessionAuthenticator>) -> AppState {
        AppState {
            connections: self.connections.clone(),
            authenticator,
            broker: self.broker.clone(),
            started_at: Instant::now(),
        }
    }

    /// Shutdown in reverse dependency order: stop accepting new
    /// connections is the caller's job (drop the listener); here we stop
    /// the sweep task, flush the broker, and drain the bus with bounded
    /// timeouts.
    pub async fn shutdown(&self) {
        self.sweep_task.abort();
        self.broker.flush_batches().await;
        self.broker.disconnect();
        self.bus.publish_sync(std::time::Duration::from_secs(5)).await;
        self.bus.shutdown();
    }
}
