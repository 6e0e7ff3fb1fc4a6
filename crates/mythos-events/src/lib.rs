//! The in-process event bus.

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventHandler, SubscriptionId};
pub use event::Event;
pub use mythos_common::topic::{EventPriority, Topic};
