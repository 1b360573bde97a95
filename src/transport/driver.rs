//! Tokio driver for [`TransportMachine`].
//!
//! DESIGN
//! ======
//! One background task owns the machine, the live connection and every
//! timer. The task waits on whichever comes first (a command from the
//! handle, an event from the socket, the heartbeat tick, the pong deadline,
//! the reconnect deadline, a finished handshake) and feeds it to the
//! machine. The returned actions run in order before the next wait, so no
//! two inputs ever interleave.
//!
//! A handshake is just another pending future in that wait. Commands keep
//! flowing while it runs, and a `disconnect()` or shutdown drops it on the
//! spot.
//!
//! The socket is abstracted by [`Connector`] and [`Connection`] so tests can
//! run the full loop on a paused clock without a network.

use std::collections::VecDeque;
use std::future::pending;
use std::time::Duration;

use async_trait::async_trait;
use frames::{Inbound, Outbound};
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until, timeout};
use tracing::{debug, info, warn};

use super::machine::{Action, TransportMachine};
use super::{ABNORMAL_CLOSURE, ConnectionState, TransportError};
use crate::config::TransportConfig;

// =============================================================================
// SEAMS
// =============================================================================

/// Opens authenticated connections.
///
/// The driver clones the connector for every handshake so the attempt can
/// run, and be dropped, independently of the driver loop.
#[async_trait]
pub trait Connector: Clone + Send + 'static {
    type Connection: Connection;

    /// Open one connection carrying `token`.
    async fn connect(&mut self, token: &str) -> Result<Self::Connection, TransportError>;
}

/// One open text-frame connection.
#[async_trait]
pub trait Connection: Send + 'static {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next event from the peer. Must be cancel-safe.
    async fn next_event(&mut self) -> ConnEvent;

    /// Close the connection. Errors are swallowed: the socket is gone either way.
    async fn close(&mut self);
}

/// What a [`Connection`] yields.
#[derive(Debug)]
pub enum ConnEvent {
    Text(String),
    /// Peer closed, with the close code if one was sent.
    Closed(Option<u16>),
    /// Socket error. The connection is unusable afterwards.
    Failed(TransportError),
}

/// What the consumer of a [`TransportClient`] sees.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Message(Inbound),
    State(ConnectionState),
}

#[derive(Debug)]
enum Command {
    Connect(String),
    Send(Outbound),
    Disconnect,
    Shutdown,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a running transport task.
///
/// Dropping the handle aborts the task and with it the socket.
#[derive(Debug)]
pub struct TransportClient {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl TransportClient {
    /// Spawn the transport task on the current tokio runtime. It stays idle
    /// until [`TransportClient::connect`].
    #[must_use]
    pub fn spawn<C: Connector>(connector: C, config: TransportConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let driver = Driver {
            connect_timeout: config.connect_timeout,
            heartbeat_period: config.heartbeat_interval,
            machine: TransportMachine::new(config),
            connector,
            conn: None,
            opening: None,
            commands: commands_rx,
            events: events_tx,
            state: state_tx,
            heartbeat: None,
            pong_deadline: None,
            reconnect_at: None,
        };
        let task = tokio::spawn(driver.run());

        Self { commands: commands_tx, events: events_rx, state: state_rx, task: Some(task) }
    }

    /// Connect with `token`. Ignored while already connecting or connected.
    pub fn connect(&self, token: impl Into<String>) {
        let _ = self.commands.send(Command::Connect(token.into()));
    }

    /// Queue a command for the server. Returns `false` and drops the message
    /// unless the connection is currently open.
    pub fn send(&self, msg: Outbound) -> bool {
        if self.state() != ConnectionState::Connected {
            warn!(state = %self.state(), "websocket not open, dropping outbound message");
            return false;
        }
        self.commands.send(Command::Send(msg)).is_ok()
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch channel following every state transition.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Next message or state change. `None` once the task has stopped.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Disconnect and wait for the task to exit.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// =============================================================================
// DRIVER LOOP
// =============================================================================

enum Wake<T> {
    Command(Option<Command>),
    Opened(Result<T, TransportError>),
    Conn(ConnEvent),
    Heartbeat,
    PongTimeout,
    ReconnectDue,
}

type Handshake<T> = BoxFuture<'static, Result<T, TransportError>>;

struct Driver<C: Connector> {
    machine: TransportMachine,
    connector: C,
    conn: Option<C::Connection>,
    opening: Option<Handshake<C::Connection>>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    connect_timeout: Duration,
    heartbeat_period: Duration,
    heartbeat: Option<Interval>,
    pong_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
}

impl<C: Connector> Driver<C> {
    async fn run(mut self) {
        debug!("transport task started");
        loop {
            let wake = tokio::select! {
                cmd = self.commands.recv() => Wake::Command(cmd),
                result = next_open(self.opening.as_mut()) => Wake::Opened(result),
                event = next_conn_event(self.conn.as_mut()) => Wake::Conn(event),
                () = next_tick(self.heartbeat.as_mut()) => Wake::Heartbeat,
                () = sleep_until_opt(self.pong_deadline) => Wake::PongTimeout,
                () = sleep_until_opt(self.reconnect_at) => Wake::ReconnectDue,
            };

            let actions = match wake {
                Wake::Command(Some(Command::Connect(token))) => self.machine.connect(token),
                Wake::Command(Some(Command::Send(msg))) => self.machine.send(&msg),
                Wake::Command(Some(Command::Disconnect)) => self.machine.disconnect(),
                Wake::Command(Some(Command::Shutdown) | None) => {
                    let actions = self.machine.disconnect();
                    self.execute(actions).await;
                    break;
                }
                Wake::Opened(result) => {
                    self.opening = None;
                    match result {
                        Ok(conn) => {
                            self.conn = Some(conn);
                            self.machine.opened()
                        }
                        Err(err) => self.machine.connect_failed(&err),
                    }
                }
                Wake::Conn(ConnEvent::Text(text)) => self.machine.frame(&text),
                Wake::Conn(ConnEvent::Closed(code)) => {
                    self.conn = None;
                    self.machine.closed(code)
                }
                Wake::Conn(ConnEvent::Failed(err)) => {
                    self.conn = None;
                    let mut actions = self.machine.errored(&err);
                    actions.extend(self.machine.closed(Some(ABNORMAL_CLOSURE)));
                    actions
                }
                Wake::Heartbeat => self.machine.heartbeat_tick(),
                Wake::PongTimeout => {
                    self.pong_deadline = None;
                    self.machine.pong_timeout()
                }
                Wake::ReconnectDue => {
                    self.reconnect_at = None;
                    self.machine.reconnect_due()
                }
            };
            self.execute(actions).await;
        }
        debug!("transport task stopped");
    }

    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Open { token } => {
                    let mut connector = self.connector.clone();
                    let limit = self.connect_timeout;
                    self.opening = Some(Box::pin(async move {
                        timeout(limit, connector.connect(&token))
                            .await
                            .unwrap_or(Err(TransportError::ConnectTimeout))
                    }));
                }
                Action::Send(text) => {
                    let Some(conn) = self.conn.as_mut() else {
                        continue;
                    };
                    if let Err(err) = conn.send_text(text).await {
                        self.conn = None;
                        queue.extend(self.machine.errored(&err));
                        queue.extend(self.machine.closed(Some(ABNORMAL_CLOSURE)));
                    }
                }
                Action::Close => {
                    if let Some(mut conn) = self.conn.take() {
                        conn.close().await;
                        queue.extend(self.machine.closed(None));
                    } else if self.opening.take().is_some() {
                        debug!("handshake abandoned");
                        queue.extend(self.machine.closed(None));
                    }
                }
                Action::StartHeartbeat => {
                    if self.conn.is_some() {
                        let mut ticker = interval_at(
                            Instant::now() + self.heartbeat_period,
                            self.heartbeat_period,
                        );
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        self.heartbeat = Some(ticker);
                    }
                }
                Action::StopHeartbeat => {
                    self.heartbeat = None;
                    self.pong_deadline = None;
                }
                Action::ArmPongTimeout(after) => {
                    if self.conn.is_some() {
                        self.pong_deadline = Some(Instant::now() + after);
                    }
                }
                Action::CancelPongTimeout => self.pong_deadline = None,
                Action::ScheduleReconnect(after) => {
                    info!(delay_ms = after.as_millis(), "reconnect scheduled");
                    self.reconnect_at = Some(Instant::now() + after);
                }
                Action::CancelReconnect => self.reconnect_at = None,
                Action::Deliver(msg) => {
                    let _ = self.events.send(TransportEvent::Message(msg));
                }
                Action::State(state) => {
                    self.state.send_replace(state);
                    let _ = self.events.send(TransportEvent::State(state));
                }
            }
        }
    }
}

async fn next_open<T>(handshake: Option<&mut Handshake<T>>) -> Result<T, TransportError> {
    match handshake {
        Some(handshake) => handshake.await,
        None => pending().await,
    }
}

async fn next_conn_event<T: Connection>(conn: Option<&mut T>) -> ConnEvent {
    match conn {
        Some(conn) => conn.next_event().await,
        None => pending().await,
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
