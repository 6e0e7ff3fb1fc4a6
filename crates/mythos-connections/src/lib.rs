//! Connection Manager: transport multiplexing, session affinity, and
//! grace-period presence semantics.

pub mod close_code;
pub mod connection;
pub mod manager;
pub mod session;

pub use close_code::CloseReason;
pub use connection::{Connection, ConnectionKind, ConnectionState, OutboundQueue};
pub use manager::{
    ConnectionManager, ConnectionManagerConfig, ConnectionManagerStats, OccupancyView,
    PresenceSink,
};
pub use session::{Session, SessionState};
