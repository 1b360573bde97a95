//! One dashboard view's connection plus the state it renders.

use frames::Outbound;

use crate::config::{ClientConfig, ConfigError};
use crate::state::{SessionState, SessionUpdate};
use crate::transport::{ConnectionState, Connector, TransportClient, WsConnector};

/// Owns the transport handle and the [`SessionState`] fed by it.
///
/// Single owner, no locks: the view loop awaits [`DashboardSession::next_updates`]
/// and reads [`DashboardSession::state`] between calls.
#[derive(Debug)]
pub struct DashboardSession {
    transport: TransportClient,
    state: SessionState,
}

impl DashboardSession {
    /// Spawn the transport on the current runtime with any connector.
    #[must_use]
    pub fn new<C: Connector>(connector: C, config: &ClientConfig) -> Self {
        Self {
            transport: TransportClient::spawn(connector, config.transport),
            state: SessionState::new(config.router()),
        }
    }

    /// Session against the configured websocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the base URL has no
    /// websocket equivalent.
    pub fn open(config: &ClientConfig) -> Result<Self, ConfigError> {
        let url = config.ws_url()?;
        Ok(Self::new(WsConnector::new(url), config))
    }

    pub fn connect(&self, token: impl Into<String>) {
        self.transport.connect(token);
    }

    /// Send an admin command. `false` when not connected.
    pub fn send(&self, msg: Outbound) -> bool {
        self.transport.send(msg)
    }

    pub fn disconnect(&self) {
        self.transport.disconnect();
    }

    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        self.transport.state()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Wait for the next transport event and fold it into the state.
    /// Returns the resulting updates (possibly empty), or `None` once the
    /// transport task has stopped.
    pub async fn next_updates(&mut self) -> Option<Vec<SessionUpdate>> {
        let event = self.transport.next_event().await?;
        Some(self.state.apply(event))
    }

    /// Disconnect and wait for the transport task to finish.
    pub async fn shutdown(self) {
        self.transport.shutdown().await;
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
