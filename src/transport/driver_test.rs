use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::sleep;

use super::*;

const PING: &str = r#"{"type":"ping"}"#;
const PONG: &str = r#"{"type":"pong"}"#;

// =============================================================
// in-memory server
// =============================================================

#[derive(Default)]
struct ServerInner {
    connects: Vec<Instant>,
    tokens: Vec<String>,
    closes: Vec<Instant>,
    sent: Vec<String>,
    feeds: Vec<UnboundedSender<ConnEvent>>,
    auto_pong: bool,
    reject_with: Option<u16>,
}

#[derive(Clone, Default)]
struct MockServer(Arc<Mutex<ServerInner>>);

impl MockServer {
    fn auto_pong(self) -> Self {
        self.0.lock().unwrap().auto_pong = true;
        self
    }

    fn reject_with(self, status: u16) -> Self {
        self.0.lock().unwrap().reject_with = Some(status);
        self
    }

    fn connects(&self) -> Vec<Instant> {
        self.0.lock().unwrap().connects.clone()
    }

    fn closes(&self) -> Vec<Instant> {
        self.0.lock().unwrap().closes.clone()
    }

    fn tokens(&self) -> Vec<String> {
        self.0.lock().unwrap().tokens.clone()
    }

    fn sent(&self) -> Vec<String> {
        self.0.lock().unwrap().sent.clone()
    }

    /// Push an event into the most recent connection.
    fn push(&self, event: ConnEvent) {
        let inner = self.0.lock().unwrap();
        let feed = inner.feeds.last().expect("no connection opened");
        feed.send(event).expect("connection gone");
    }

    fn push_text(&self, text: &str) {
        self.push(ConnEvent::Text(text.to_owned()));
    }
}

#[derive(Clone)]
struct MockConnector(MockServer);

struct MockConnection {
    server: MockServer,
    feed: UnboundedSender<ConnEvent>,
    inbox: UnboundedReceiver<ConnEvent>,
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&mut self, token: &str) -> Result<MockConnection, TransportError> {
        let mut inner = self.0.0.lock().unwrap();
        inner.connects.push(Instant::now());
        inner.tokens.push(token.to_owned());
        if let Some(status) = inner.reject_with {
            return Err(TransportError::Rejected(status));
        }
        let (tx, rx) = unbounded_channel();
        inner.feeds.push(tx.clone());
        Ok(MockConnection { server: self.0.clone(), feed: tx, inbox: rx })
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let mut inner = self.server.0.lock().unwrap();
        if inner.auto_pong && text == PING {
            let _ = self.feed.send(ConnEvent::Text(PONG.to_owned()));
        }
        inner.sent.push(text);
        Ok(())
    }

    async fn next_event(&mut self) -> ConnEvent {
        match self.inbox.recv().await {
            Some(event) => event,
            None => ConnEvent::Closed(None),
        }
    }

    async fn close(&mut self) {
        self.server.0.lock().unwrap().closes.push(Instant::now());
    }
}

/// Handshake that never completes, counting attempts.
#[derive(Clone, Default)]
struct HangingConnector(Arc<Mutex<u32>>);

impl HangingConnector {
    fn attempts(&self) -> u32 {
        *self.0.lock().unwrap()
    }
}

#[async_trait]
impl Connector for HangingConnector {
    type Connection = MockConnection;

    async fn connect(&mut self, _token: &str) -> Result<MockConnection, TransportError> {
        *self.0.lock().unwrap() += 1;
        std::future::pending().await
    }
}

fn spawn(server: &MockServer) -> TransportClient {
    TransportClient::spawn(MockConnector(server.clone()), TransportConfig::default())
}

/// Let the driver task drain its queue.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

async fn drain(client: &mut TransportClient) -> Vec<TransportEvent> {
    settle().await;
    let mut out = Vec::new();
    while let Ok(event) = client.events.try_recv() {
        out.push(event);
    }
    out
}

fn states(events: &[TransportEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|e| match e {
            TransportEvent::State(s) => Some(*s),
            TransportEvent::Message(_) => None,
        })
        .collect()
}

// =============================================================
// tests
// =============================================================

#[tokio::test(start_paused = true)]
async fn connect_reaches_connected_and_delivers_messages() {
    let server = MockServer::default();
    let mut client = spawn(&server);
    client.connect("tok");

    let events = drain(&mut client).await;
    assert_eq!(states(&events), vec![ConnectionState::Connecting, ConnectionState::Connected]);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(server.tokens(), vec!["tok".to_owned()]);

    server.push_text(r#"{"type":"status_update","username":"user3","status":"online"}"#);
    server.push_text(PONG);
    let events = drain(&mut client).await;
    assert_eq!(events.len(), 1, "pong must not reach the consumer: {events:?}");
    assert!(matches!(&events[0], TransportEvent::Message(Inbound::StatusUpdate(u)) if u.username == "user3"));
}

#[tokio::test(start_paused = true)]
async fn answered_heartbeats_keep_one_connection() {
    let server = MockServer::default().auto_pong();
    let client = spawn(&server);
    client.connect("tok");

    sleep(Duration::from_secs(100)).await;

    assert_eq!(server.connects().len(), 1);
    assert!(server.closes().is_empty());
    let pings = server.sent().iter().filter(|s| *s == PING).count();
    assert_eq!(pings, 3);
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn missed_pong_closes_then_reconnects_after_delay() {
    let server = MockServer::default();
    let start = Instant::now();
    let client = spawn(&server);
    client.connect("tok");

    sleep(Duration::from_secs(36)).await;
    let closes = server.closes();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0] - start, Duration::from_secs(35));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.connects().len(), 1);

    sleep(Duration::from_secs(3)).await;
    let connects = server.connects();
    assert_eq!(connects.len(), 2);
    assert!(connects[1] - closes[0] >= Duration::from_secs(3));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn three_missed_pongs_give_three_spaced_reconnects() {
    let server = MockServer::default();
    let client = spawn(&server);
    client.connect("tok");

    sleep(Duration::from_secs(115)).await;

    let connects = server.connects();
    let closes = server.closes();
    assert_eq!(connects.len(), 4, "initial connect plus three reconnects");
    assert_eq!(closes.len(), 3);
    for (close, reconnect) in closes.iter().zip(&connects[1..]) {
        assert!(*reconnect - *close >= Duration::from_secs(3));
    }
    assert!(server.tokens().iter().all(|t| t == "tok"));
}

#[tokio::test(start_paused = true)]
async fn fatal_close_code_stops_reconnecting() {
    let server = MockServer::default();
    let mut client = spawn(&server);
    client.connect("tok");
    drain(&mut client).await;

    server.push(ConnEvent::Closed(Some(4001)));
    let events = drain(&mut client).await;
    assert_eq!(states(&events), vec![ConnectionState::AuthFailed]);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(server.connects().len(), 1);
    assert_eq!(client.state(), ConnectionState::AuthFailed);
}

#[tokio::test(start_paused = true)]
async fn retryable_close_code_reconnects() {
    let server = MockServer::default().auto_pong();
    let mut client = spawn(&server);
    client.connect("tok");
    drain(&mut client).await;

    server.push(ConnEvent::Closed(Some(1011)));
    let events = drain(&mut client).await;
    assert_eq!(states(&events), vec![ConnectionState::Disconnected]);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(server.connects().len(), 2);
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn socket_failure_passes_through_error_then_retries() {
    let server = MockServer::default().auto_pong();
    let mut client = spawn(&server);
    client.connect("tok");
    drain(&mut client).await;

    server.push(ConnEvent::Failed(TransportError::Receive("reset".to_owned())));
    let events = drain(&mut client).await;
    assert_eq!(
        states(&events),
        vec![ConnectionState::Error, ConnectionState::Disconnected]
    );

    sleep(Duration::from_secs(3)).await;
    assert_eq!(server.connects().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn explicit_disconnect_goes_idle_without_reconnect() {
    let server = MockServer::default().auto_pong();
    let mut client = spawn(&server);
    client.connect("tok");
    drain(&mut client).await;

    client.disconnect();
    let events = drain(&mut client).await;
    assert_eq!(states(&events), vec![ConnectionState::Idle]);
    assert_eq!(server.closes().len(), 1);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(server.connects().len(), 1);
    assert!(server.sent().is_empty(), "no heartbeat after disconnect");
}

#[tokio::test(start_paused = true)]
async fn send_requires_open_connection() {
    let server = MockServer::default();
    let client = spawn(&server);
    assert!(!client.send(Outbound::ShiftCommand));

    client.connect("tok");
    settle().await;
    assert!(client.send(Outbound::ShiftCommand));
    settle().await;
    assert_eq!(server.sent(), vec![r#"{"type":"shift_command"}"#.to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn handshake_forbidden_is_auth_failure() {
    let server = MockServer::default().reject_with(403);
    let mut client = spawn(&server);
    client.connect("bad");

    let events = drain(&mut client).await;
    assert_eq!(states(&events), vec![ConnectionState::Connecting, ConnectionState::AuthFailed]);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(server.connects().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn handshake_server_error_is_retried() {
    let server = MockServer::default().reject_with(500);
    let mut client = spawn(&server);
    client.connect("tok");

    let events = drain(&mut client).await;
    assert_eq!(
        states(&events),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Error,
            ConnectionState::Disconnected,
        ]
    );

    // Attempts at 0s, 3s and 6s.
    sleep(Duration::from_millis(6_500)).await;
    assert_eq!(server.connects().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_socket_and_stops_task() {
    let server = MockServer::default().auto_pong();
    let client = spawn(&server);
    client.connect("tok");
    settle().await;

    client.shutdown().await;
    assert_eq!(server.closes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_handshake_goes_idle_immediately() {
    let connector = HangingConnector::default();
    let mut client = TransportClient::spawn(connector.clone(), TransportConfig::default());
    client.connect("tok");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(client.state(), ConnectionState::Connecting);

    client.disconnect();
    let events = drain(&mut client).await;
    assert_eq!(states(&events), vec![ConnectionState::Connecting, ConnectionState::Idle]);
    assert_eq!(client.state(), ConnectionState::Idle);

    // Past the connect timeout and several reconnect delays.
    sleep(Duration::from_secs(30)).await;
    assert!(drain(&mut client).await.is_empty());
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_handshake_times_out_and_retries() {
    let connector = HangingConnector::default();
    let mut client = TransportClient::spawn(connector.clone(), TransportConfig::default());
    client.connect("tok");

    sleep(Duration::from_millis(10_500)).await;
    let events = drain(&mut client).await;
    assert_eq!(
        states(&events),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Error,
            ConnectionState::Disconnected,
        ]
    );

    sleep(Duration::from_secs(3)).await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_handshake_returns_promptly() {
    let connector = HangingConnector::default();
    let client = TransportClient::spawn(connector.clone(), TransportConfig::default());
    client.connect("tok");
    settle().await;

    let start = Instant::now();
    client.shutdown().await;
    assert!(Instant::now() - start < Duration::from_secs(1));
    assert_eq!(connector.attempts(), 1);
}
