//! Transport surface: axum routes, the WebSocket/SSE connection loops, and
//! the real-time handlers that glue the event bus and broker to the
//! connection manager.

pub mod auth;
pub mod handlers;
pub mod health;
pub mod occupancy;
pub mod router;
pub mod sse;
pub mod state;
pub mod ws;

pub use auth::{AllowAnyAuthenticator, SessionAuthenticator};
pub use handlers::RealTimeHandlers;
pub use occupancy::RoomCatalogOccupancyView;
pub use router::build_router;
pub use state::AppState;
