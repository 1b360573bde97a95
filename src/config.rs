//! Client configuration parsed from environment variables.
//!
//! Every knob has a default matching the live game, so an empty environment
//! yields a working local setup. Unparseable values fall back to defaults.

use std::time::Duration;

use crate::router::{DEFAULT_TOTAL_SESSIONS, SessionRouter};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_WS_PATH: &str = "/ws/connect";
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_PONG_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("IRIS_TOTAL_SESSIONS must be at least 1")]
    ZeroSessions,
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Timing policy of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Time between heartbeat pings while connected.
    pub heartbeat_interval: Duration,
    /// How long a ping may wait for its pong before the socket is presumed dead.
    pub pong_timeout: Duration,
    /// Fixed delay before every reconnect attempt.
    pub reconnect_delay: Duration,
    /// Upper bound on one handshake.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            pong_timeout: Duration::from_secs(DEFAULT_PONG_TIMEOUT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl TransportConfig {
    /// Optional:
    /// - `IRIS_HEARTBEAT_SECS`: default 30
    /// - `IRIS_PONG_TIMEOUT_SECS`: default 5
    /// - `IRIS_RECONNECT_DELAY_SECS`: default 3
    /// - `IRIS_CONNECT_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| Duration::from_secs(parse_or(&lookup, key, default));
        Self {
            heartbeat_interval: secs("IRIS_HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS),
            pong_timeout: secs("IRIS_PONG_TIMEOUT_SECS", DEFAULT_PONG_TIMEOUT_SECS),
            reconnect_delay: secs("IRIS_RECONNECT_DELAY_SECS", DEFAULT_RECONNECT_DELAY_SECS),
            connect_timeout: secs("IRIS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP base URL of the game server, without trailing slash.
    pub base_url: String,
    /// Path of the websocket endpoint.
    pub ws_path: String,
    /// Number of session slots `N`.
    pub total_sessions: u32,
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `IRIS_BASE_URL`: default `http://127.0.0.1:8000`
    /// - `IRIS_WS_PATH`: default `/ws/connect`
    /// - `IRIS_TOTAL_SESSIONS`: default 8
    /// - transport timings, see [`TransportConfig::from_env`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSessions`] when the slot count is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("IRIS_BASE_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let ws_path = lookup("IRIS_WS_PATH")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_WS_PATH.to_owned());
        let total_sessions = parse_or(&lookup, "IRIS_TOTAL_SESSIONS", DEFAULT_TOTAL_SESSIONS);
        if total_sessions == 0 {
            return Err(ConfigError::ZeroSessions);
        }

        Ok(Self {
            base_url,
            ws_path,
            total_sessions,
            transport: TransportConfig::from_lookup(lookup),
        })
    }

    /// Router sized to this game.
    #[must_use]
    pub fn router(&self) -> SessionRouter {
        SessionRouter::new(self.total_sessions)
    }

    /// Websocket endpoint derived from the HTTP base URL (token not included).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] unless the base URL uses
    /// `http`, `https`, `ws` or `wss`.
    pub fn ws_url(&self) -> Result<String, ConfigError> {
        ws_url(&self.base_url, &self.ws_path)
    }
}

/// Convert an HTTP(S) base URL into the websocket endpoint URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for unsupported schemes.
pub fn ws_url(base_url: &str, path: &str) -> Result<String, ConfigError> {
    let trimmed = base_url.trim_end_matches('/');
    let path = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };

    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{path}"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{path}"));
    }
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(format!("{trimmed}{path}"));
    }

    Err(ConfigError::InvalidBaseUrl(base_url.to_owned()))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
