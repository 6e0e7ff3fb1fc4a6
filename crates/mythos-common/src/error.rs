//! Error taxonomy for the real-time core.
//!
//! These are *kinds*, not exhaustive wire types: transports map them to
//! short, non-diagnostic strings; diagnostic detail lives only in structured
//! logs keyed by correlation id.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MythosError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("authorization denied: {0}")]
    Authorization(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("concurrent modification, retries exhausted")]
    Concurrency,

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("internal error (correlation_id={correlation_id})")]
    Internal { correlation_id: String },
}

impl MythosError {
    /// The opaque, user-facing message. Never includes diagnostic detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            MythosError::Validation(_) => "the request was invalid",
            MythosError::Authentication(_) => "authentication failed",
            MythosError::Authorization(_) => "you are not permitted to do that",
            MythosError::Transport(_) => "a connection error occurred",
            MythosError::Broker(_) => "a messaging error occurred",
            MythosError::Concurrency => "please try again",
            MythosError::Timeout(_) => "the request timed out",
            MythosError::Internal { .. } => "an error occurred",
        }
    }
}

/// Errors from the external message broker client.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("could not connect to broker: {0}")]
    Connect(String),

    #[error("could not publish: {0}")]
    Publish(String),

    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    #[error("could not subscribe: {0}")]
    Subscribe(String),

    #[error("could not unsubscribe: {0}")]
    Unsubscribe(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("broker operation timed out")]
    Timeout,
}

/// Error kinds surfaced verbatim by the movement service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MovementError {
    #[error("player not found")]
    PlayerNotFound,
    #[error("room not found")]
    RoomNotFound,
    #[error("invalid exit")]
    InvalidExit,
    #[error("player state forbids movement")]
    StateForbidsMovement,
    #[error("concurrent modification")]
    ConcurrentModification,
    #[error("internal error")]
    InternalError,
}

/// Errors returned by Connection Manager attach operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("player already has a conflicting session")]
    PlayerSessionConflict,
    #[error("transport failed to accept the connection")]
    TransportAcceptFailed,
    #[error("player has reached the maximum number of connections")]
    MaxConnectionsExceeded,
}
