use frames::decode_inbound;

use super::*;

fn msg(json: &str) -> TransportEvent {
    TransportEvent::Message(decode_inbound(json).expect("valid frame"))
}

fn connected() -> SessionState {
    let mut state = SessionState::default();
    state.apply(TransportEvent::State(ConnectionState::Connected));
    state
}

fn online(state: &mut SessionState, username: &str) {
    state.apply(msg(&format!(
        r#"{{"type":"status_update","username":"{username}","status":"online"}}"#
    )));
}

#[test]
fn status_updates_track_presence_and_report_changes_once() {
    let mut state = connected();
    let frame = r#"{"type":"status_update","username":"user1","status":"online"}"#;
    assert_eq!(
        state.apply(msg(frame)),
        vec![SessionUpdate::Presence { username: "user1".to_owned(), online: true }]
    );
    assert!(state.apply(msg(frame)).is_empty());

    let offline = r#"{"type":"status_update","username":"user1","status":"offline"}"#;
    assert_eq!(state.apply(msg(offline)).len(), 1);
    assert!(state.apply(msg(offline)).is_empty());
    assert_eq!(state.presence().online_count(), 0);
}

#[test]
fn game_state_shift_reroutes_slots() {
    let mut state = connected();
    let updates = state.apply(msg(r#"{"type":"gamestate_update","shift":2,"temperature":71.5}"#));
    assert_eq!(updates, vec![SessionUpdate::Shift(2), SessionUpdate::GameState]);
    assert_eq!(state.agent_for_slot(3), 1);
    assert_eq!(state.agent_for_slot(1), 7);
    assert_eq!(state.game().get("temperature"), Some(&serde_json::json!(71.5)));
}

#[test]
fn unchanged_shift_is_not_reported() {
    let mut state = connected();
    state.apply(msg(r#"{"type":"gamestate_update","shift":3}"#));
    assert!(state.apply(msg(r#"{"type":"gamestate_update","shift":11}"#)).is_empty());
    assert_eq!(state.shift(), 3);
}

#[test]
fn negative_shift_is_normalized() {
    let mut state = connected();
    state.apply(msg(r#"{"type":"gamestate_update","shift":-1}"#));
    assert_eq!(state.shift(), 7);
}

#[test]
fn slot_becomes_fully_active_when_both_sides_are_online() {
    let mut state = connected();
    state.apply(msg(r#"{"type":"gamestate_update","shift":2}"#));
    online(&mut state, "user3");
    assert!(!state.is_slot_fully_active(3));
    online(&mut state, "agent1");
    assert!(state.is_slot_fully_active(3));

    // Rotating the shift moves slot 3 onto agent8, who is offline.
    state.apply(msg(r#"{"type":"gamestate_update","shift":3}"#));
    assert!(!state.is_slot_fully_active(3));
}

#[test]
fn reconnect_clears_stale_presence() {
    let mut state = connected();
    online(&mut state, "user1");
    online(&mut state, "agent1");

    state.apply(TransportEvent::State(ConnectionState::Disconnected));
    assert_eq!(state.presence().online_count(), 2, "kept while retrying");

    state.apply(TransportEvent::State(ConnectionState::Connecting));
    state.apply(TransportEvent::State(ConnectionState::Connected));
    assert_eq!(state.presence().online_count(), 0);
}

#[test]
fn init_snapshot_seeds_presence_and_shift() {
    let mut state = connected();
    online(&mut state, "user5");

    let updates = state.apply(msg(
        r#"{"type":"init","shift":1,"temperature":40.0,"online":["user1","agent8"]}"#,
    ));
    assert_eq!(
        updates,
        vec![
            SessionUpdate::Shift(1),
            SessionUpdate::GameState,
            SessionUpdate::PresenceSeeded { online: 2 },
        ]
    );
    assert!(!state.presence().is_online("user5"));
    assert!(state.is_slot_fully_active(1), "slot 1 is served by agent8 at shift 1");
}

#[test]
fn init_without_online_keeps_presence() {
    let mut state = connected();
    online(&mut state, "user2");
    state.apply(msg(r#"{"type":"init","shift":0}"#));
    assert!(state.presence().is_online("user2"));
}

#[test]
fn unknown_messages_are_forwarded() {
    let mut state = connected();
    let updates = state.apply(msg(r#"{"type":"chat_message","text":"hi"}"#));
    let [SessionUpdate::Forward { kind, data }] = updates.as_slice() else {
        panic!("expected forward, got {updates:?}");
    };
    assert_eq!(kind, "chat_message");
    assert_eq!(data.get("text"), Some(&serde_json::json!("hi")));
}

#[test]
fn seeded_shift_reports_once() {
    let mut state = SessionState::default();
    assert_eq!(state.seed_shift(4), Some(SessionUpdate::Shift(4)));
    assert_eq!(state.seed_shift(4), None);
}

#[test]
fn duplicate_connection_state_is_silent() {
    let mut state = connected();
    assert!(state.apply(TransportEvent::State(ConnectionState::Connected)).is_empty());
    assert_eq!(state.connection(), ConnectionState::Connected);
}
