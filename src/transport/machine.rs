//! Connection policy as a synchronous state machine.
//!
//! DESIGN
//! ======
//! Every input (user call, inbound frame, timer firing, socket close) is a
//! method that mutates the machine and returns the [`Action`]s the caller
//! must perform, in order. The machine never touches a socket or a clock, so
//! each ordering rule below is checked by plain unit tests:
//!
//! - at most one socket is live; close events without one are ignored
//! - at most one reconnect is pending
//! - at most one ping is awaiting its pong
//! - after `disconnect` no timer survives and no reconnect is scheduled

use std::time::Duration;

use frames::{Inbound, Outbound, decode_inbound, encode_outbound};
use tracing::{debug, error, info, warn};

use super::{ConnectionState, TransportError, is_fatal_close};
use crate::config::TransportConfig;

/// Side effect requested by the machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Open a socket authenticated with `token`; report back through
    /// [`TransportMachine::opened`] or [`TransportMachine::connect_failed`].
    Open { token: String },
    /// Write one text frame on the live socket.
    Send(String),
    /// Close the live socket; report back through [`TransportMachine::closed`].
    Close,
    /// Start the periodic heartbeat tick.
    StartHeartbeat,
    /// Stop the heartbeat tick and drop any armed pong timeout.
    StopHeartbeat,
    /// Fire [`TransportMachine::pong_timeout`] after this long.
    ArmPongTimeout(Duration),
    CancelPongTimeout,
    /// Fire [`TransportMachine::reconnect_due`] after this long.
    ScheduleReconnect(Duration),
    CancelReconnect,
    /// Hand an application message to the consumer.
    Deliver(Inbound),
    /// Publish a new connection state.
    State(ConnectionState),
}

/// Connect/heartbeat/reconnect policy for one logical connection.
#[derive(Debug)]
pub struct TransportMachine {
    config: TransportConfig,
    state: ConnectionState,
    token: Option<String>,
    explicitly_closed: bool,
    socket_live: bool,
    heartbeat_running: bool,
    pong_pending: bool,
    reconnect_pending: bool,
}

impl TransportMachine {
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Idle,
            token: None,
            explicitly_closed: false,
            socket_live: false,
            heartbeat_running: false,
            pong_pending: false,
            reconnect_pending: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    #[must_use]
    pub fn pong_pending(&self) -> bool {
        self.pong_pending
    }

    // =========================================================================
    // USER CALLS
    // =========================================================================

    /// Start connecting with `token`. Ignored while a connection is already
    /// being opened or is open.
    pub fn connect(&mut self, token: String) -> Vec<Action> {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            warn!(state = %self.state, "connect ignored: connection already active");
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.explicitly_closed = false;
        self.token = Some(token.clone());
        self.cancel_reconnect(&mut actions);
        self.begin_open(token, &mut actions);
        actions
    }

    /// Send a command if connected; otherwise drop it.
    pub fn send(&mut self, msg: &Outbound) -> Vec<Action> {
        if self.state != ConnectionState::Connected {
            warn!(state = %self.state, "websocket not open, dropping outbound message");
            return Vec::new();
        }
        send_frame(msg).into_iter().collect()
    }

    /// Tear down permanently: no reconnect happens until the next `connect`.
    pub fn disconnect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.explicitly_closed = true;
        self.stop_heartbeat(&mut actions);
        self.cancel_reconnect(&mut actions);
        if self.socket_live {
            actions.push(Action::Close);
        }
        self.set_state(ConnectionState::Idle, &mut actions);
        info!("websocket explicitly disconnected");
        actions
    }

    // =========================================================================
    // SOCKET EVENTS
    // =========================================================================

    /// The socket requested by [`Action::Open`] is up.
    pub fn opened(&mut self) -> Vec<Action> {
        if !self.socket_live {
            debug!("open reported without a pending socket");
            return Vec::new();
        }
        if self.explicitly_closed {
            // Disconnected while the handshake was in flight.
            return vec![Action::Close];
        }

        let mut actions = Vec::new();
        self.set_state(ConnectionState::Connected, &mut actions);
        self.heartbeat_running = true;
        self.pong_pending = false;
        actions.push(Action::StartHeartbeat);
        info!("websocket connected");
        actions
    }

    /// The socket requested by [`Action::Open`] could not be opened.
    pub fn connect_failed(&mut self, err: &TransportError) -> Vec<Action> {
        if !self.socket_live {
            return Vec::new();
        }
        self.socket_live = false;

        let mut actions = Vec::new();
        if self.explicitly_closed {
            return actions;
        }
        if err.is_auth_rejection() {
            error!(error = %err, "websocket auth failure, stopping reconnection loop");
            self.set_state(ConnectionState::AuthFailed, &mut actions);
            return actions;
        }

        warn!(error = %err, "websocket connect failed");
        self.set_state(ConnectionState::Error, &mut actions);
        self.set_state(ConnectionState::Disconnected, &mut actions);
        self.schedule_reconnect(&mut actions);
        actions
    }

    /// A transport error on the live socket. The socket is expected to close
    /// right after, so this only publishes the transient error state.
    pub fn errored(&mut self, err: &TransportError) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.socket_live || self.explicitly_closed {
            return actions;
        }
        warn!(error = %err, "websocket error");
        self.set_state(ConnectionState::Error, &mut actions);
        actions
    }

    /// One inbound text frame.
    pub fn frame(&mut self, text: &str) -> Vec<Action> {
        if self.state != ConnectionState::Connected {
            debug!(state = %self.state, "ignoring frame outside connected state");
            return Vec::new();
        }

        match decode_inbound(text) {
            Ok(Inbound::Pong) => {
                if self.pong_pending {
                    self.pong_pending = false;
                    vec![Action::CancelPongTimeout]
                } else {
                    Vec::new()
                }
            }
            Ok(Inbound::Ping) => send_frame(&Outbound::Pong).into_iter().collect(),
            Ok(msg) => vec![Action::Deliver(msg)],
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                Vec::new()
            }
        }
    }

    /// The socket closed, whether the server closed it, the network dropped
    /// it, or we closed it ourselves.
    pub fn closed(&mut self, code: Option<u16>) -> Vec<Action> {
        if !self.socket_live {
            debug!(?code, "close reported without a live socket");
            return Vec::new();
        }
        self.socket_live = false;

        let mut actions = Vec::new();
        self.stop_heartbeat(&mut actions);

        if self.explicitly_closed {
            return actions;
        }

        if is_fatal_close(code) {
            error!(?code, "websocket auth failure, stopping reconnection loop");
            self.set_state(ConnectionState::AuthFailed, &mut actions);
            return actions;
        }

        info!(?code, "websocket disconnected, scheduling reconnect");
        self.set_state(ConnectionState::Disconnected, &mut actions);
        self.schedule_reconnect(&mut actions);
        actions
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    /// Heartbeat interval elapsed.
    pub fn heartbeat_tick(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Connected || !self.heartbeat_running {
            return Vec::new();
        }
        if self.pong_pending {
            debug!("previous ping still awaiting pong");
            return Vec::new();
        }
        let Some(ping) = send_frame(&Outbound::Ping) else {
            return Vec::new();
        };
        self.pong_pending = true;
        vec![ping, Action::ArmPongTimeout(self.config.pong_timeout)]
    }

    /// No pong arrived in time: the connection is presumed dead.
    pub fn pong_timeout(&mut self) -> Vec<Action> {
        if !self.pong_pending || self.state != ConnectionState::Connected {
            return Vec::new();
        }
        self.pong_pending = false;
        warn!("websocket pong timeout, reconnecting");
        vec![Action::Close]
    }

    /// Reconnect delay elapsed.
    pub fn reconnect_due(&mut self) -> Vec<Action> {
        if !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        if self.explicitly_closed || self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        let Some(token) = self.token.clone() else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        self.begin_open(token, &mut actions);
        actions
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn begin_open(&mut self, token: String, actions: &mut Vec<Action>) {
        self.socket_live = true;
        self.set_state(ConnectionState::Connecting, actions);
        actions.push(Action::Open { token });
    }

    fn set_state(&mut self, next: ConnectionState, actions: &mut Vec<Action>) {
        if self.state != next {
            self.state = next;
            actions.push(Action::State(next));
        }
    }

    fn stop_heartbeat(&mut self, actions: &mut Vec<Action>) {
        if self.heartbeat_running || self.pong_pending {
            actions.push(Action::StopHeartbeat);
        }
        self.heartbeat_running = false;
        self.pong_pending = false;
    }

    fn schedule_reconnect(&mut self, actions: &mut Vec<Action>) {
        if !self.reconnect_pending {
            self.reconnect_pending = true;
            actions.push(Action::ScheduleReconnect(self.config.reconnect_delay));
        }
    }

    fn cancel_reconnect(&mut self, actions: &mut Vec<Action>) {
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(Action::CancelReconnect);
        }
    }
}

/// `Send` action for `msg`, or nothing if it cannot be encoded.
fn send_frame(msg: &Outbound) -> Option<Action> {
    match encode_outbound(msg) {
        Ok(text) => Some(Action::Send(text)),
        Err(error) => {
            warn!(%error, "dropping outbound message that failed to encode");
            None
        }
    }
}

#[cfg(test)]
#[path = "machine_test.rs"]
mod tests;
