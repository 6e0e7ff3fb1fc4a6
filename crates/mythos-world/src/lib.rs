//! Room model, occupant tracking, and the movement service.

pub mod catalog;
pub mod movement;
pub mod player_state;
pub mod room;

pub use catalog::RoomCatalog;
pub use movement::MovementService;
pub use player_state::{PlayerRegistry, PlayerState};
pub use room::{Direction, EventPublisher, Room};
