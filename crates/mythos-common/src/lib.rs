//! Shared types for the MythosMUD real-time core: ids, envelopes,
//! configuration, error taxonomy, and the ambient logging/metrics stack.
//!
//! Every other crate in this workspace depends on `mythos-common` and
//! nothing else depends on a sibling's concrete type — components receive
//! capabilities through traits defined here, wired together once by the
//! daemon binary's `Services` container.

pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod topic;

pub use config::MythosConfig;
pub use envelope::{Envelope, InboundFrame, OutboundFrame, Priority};
pub use error::{AttachError, BrokerError, MovementError, MythosError};
pub use ids::{ConnectionId, CorrelationId, PlayerId, RoomId, SessionId, SubZoneId, ZoneId};
pub use topic::{EventPriority, Topic};
