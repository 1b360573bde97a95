//! Resilient realtime transport for dashboard views.
//!
//! SYSTEM CONTEXT
//! ==============
//! `machine` holds the connection policy as a synchronous state machine that
//! turns events (frames, timer firings, user calls) into actions. `driver`
//! runs that machine on a tokio task against any [`Connector`], and `ws`
//! provides the tokio-tungstenite connector used in production.
//!
//! ERROR HANDLING
//! ==============
//! Network drops, heartbeat timeouts and handshake failures are retried on a
//! fixed delay and only ever surface as [`ConnectionState`] changes. Auth
//! rejections (fatal close codes, HTTP 401/403 on upgrade) stop the loop in
//! [`ConnectionState::AuthFailed`].

pub mod driver;
pub mod machine;
pub mod ws;

use std::fmt;

pub use driver::{ConnEvent, Connection, Connector, TransportClient, TransportEvent};
pub use machine::{Action, TransportMachine};
pub use ws::WsConnector;

/// Close code reported when a connection dies without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close codes that mean the server rejected our credentials. Retrying with
/// the same token would hot-loop against the server.
pub const FATAL_CLOSE_CODES: [u16; 3] = [1008, 4001, 4003];

/// Whether a close code ends the reconnect loop.
#[must_use]
pub fn is_fatal_close(code: Option<u16>) -> bool {
    code.is_some_and(|c| FATAL_CLOSE_CODES.contains(&c))
}

/// Lifecycle of the dashboard's single logical connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, or explicitly disconnected.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Socket open, heartbeat running.
    Connected,
    /// Connection lost; a reconnect is scheduled.
    Disconnected,
    /// Server rejected the token. Terminal until a new `connect`.
    AuthFailed,
    /// Transient transport error, normally followed by `Disconnected`.
    Error,
}

impl ConnectionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::AuthFailed => "auth_failed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure opening or using a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid websocket URL: {0}")]
    InvalidUrl(String),
    /// The server answered the upgrade request with a non-101 status.
    #[error("websocket handshake rejected with HTTP {0}")]
    Rejected(u16),
    #[error("websocket handshake failed: {0}")]
    Handshake(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("timed out opening websocket")]
    ConnectTimeout,
    #[error("websocket send failed: {0}")]
    Send(String),
    #[error("websocket receive failed: {0}")]
    Receive(String),
}

impl TransportError {
    /// Handshake refused for authentication reasons.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected(401 | 403))
    }
}
