use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_environment_uses_game_defaults() {
    let config = ClientConfig::from_lookup(lookup(&[])).expect("config");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.ws_path, DEFAULT_WS_PATH);
    assert_eq!(config.total_sessions, 8);
    assert_eq!(config.transport, TransportConfig::default());
    assert_eq!(config.transport.heartbeat_interval, Duration::from_secs(30));
    assert_eq!(config.transport.pong_timeout, Duration::from_secs(5));
    assert_eq!(config.transport.reconnect_delay, Duration::from_secs(3));
}

#[test]
fn environment_overrides_are_applied() {
    let config = ClientConfig::from_lookup(lookup(&[
        ("IRIS_BASE_URL", "https://iris.example/"),
        ("IRIS_TOTAL_SESSIONS", "4"),
        ("IRIS_HEARTBEAT_SECS", "10"),
        ("IRIS_RECONNECT_DELAY_SECS", " 7 "),
    ]))
    .expect("config");
    assert_eq!(config.base_url, "https://iris.example");
    assert_eq!(config.router().total(), 4);
    assert_eq!(config.transport.heartbeat_interval, Duration::from_secs(10));
    assert_eq!(config.transport.reconnect_delay, Duration::from_secs(7));
}

#[test]
fn unparseable_values_fall_back_to_defaults() {
    let config = TransportConfig::from_lookup(lookup(&[("IRIS_PONG_TIMEOUT_SECS", "soon")]));
    assert_eq!(config.pong_timeout, Duration::from_secs(DEFAULT_PONG_TIMEOUT_SECS));
}

#[test]
fn zero_sessions_is_rejected() {
    let err = ClientConfig::from_lookup(lookup(&[("IRIS_TOTAL_SESSIONS", "0")])).expect_err("should fail");
    assert!(matches!(err, ConfigError::ZeroSessions));
}

#[test]
fn ws_url_converts_http_schemes() {
    assert_eq!(
        ws_url("http://127.0.0.1:8000", "/ws/connect").expect("url"),
        "ws://127.0.0.1:8000/ws/connect"
    );
    assert_eq!(
        ws_url("https://iris.example/", "ws/connect").expect("url"),
        "wss://iris.example/ws/connect"
    );
    assert_eq!(
        ws_url("wss://iris.example", "/ws/connect").expect("url"),
        "wss://iris.example/ws/connect"
    );
}

#[test]
fn ws_url_rejects_unknown_scheme() {
    let err = ws_url("ftp://iris.example", "/ws/connect").expect_err("should fail");
    assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
}
