//! Session-token authentication at the transport boundary.
//!
//! JWT issuance and the account/credentials model live outside this crate
//! (an external collaborator); this module only defines the narrow
//! interface the WebSocket/SSE handlers call before a stream is opened, and
//! a permissive stand-in used in tests and local development.

use async_trait::async_trait;
use axum::http::HeaderMap;
use mythos_common::{PlayerId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedAttach {
    pub player_id: PlayerId,
    pub session_id: SessionId,
}

#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// Validates the bearer token (header, or WebSocket subprotocol) for
    /// the given path parameters. Returning `Err` causes the handler to
    /// reject with HTTP 401 before any stream is opened.
    async fn authenticate(
        &self,
        player_id: PlayerId,
        session_id: SessionId,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedAttach, ()>;
}

/// Extracts `Bearer <token>` from the `Authorization` header, falling back
/// to the `sec-websocket-protocol` subprotocol list (for browser clients
/// that cannot set arbitrary headers on a WebSocket upgrade request).
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        let value = value.to_str().ok()?;
        return value.strip_prefix("Bearer ").map(str::to_string);
    }
    let protocols = headers.get(axum::http::header::SEC_WEBSOCKET_PROTOCOL)?;
    let protocols = protocols.to_str().ok()?;
    protocols
        .split(',')
        .map(str::trim)
        .find_map(|p| p.strip_prefix("bearer."))
        .map(str::to_string)
}

/// Accepts any request carrying a bearer token of any shape. Intended for
/// local development and integration tests; production deployments supply
/// a `SessionAuthenticator` backed by the real auth service.
pub struct AllowAnyAuthenticator;

#[async_trait]
impl SessionAuthenticator for AllowAnyAuthenticator {
    async fn authenticate(
        &self,
        player_id: PlayerId,
        session_id: SessionId,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedAttach, ()> {
        extract_bearer_token(headers)
            .map(|_| AuthenticatedAttach { player_id, session_id })
            .ok_or(())
    }
}
