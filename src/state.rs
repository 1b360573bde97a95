//! Dashboard session state.
//!
//! DESIGN
//! ======
//! `SessionState` is the single owner of everything views read: the shift
//! offset, the presence set, the last game-state snapshot and the connection
//! state. It is fed [`TransportEvent`]s one at a time and answers each with
//! the [`SessionUpdate`]s that actually changed something, so views redraw
//! only what moved.
//!
//! Presence is rebuilt from scratch on every (re)connect: the set is cleared
//! when the connection opens and reseeded when an `init` snapshot arrives.

use frames::{GameStateUpdate, Inbound, InitSnapshot, StatusUpdate};
use serde_json::{Map, Value};
use tracing::debug;

use crate::presence::PresenceTracker;
use crate::router::{SessionRouter, ShiftOffset};
use crate::transport::{ConnectionState, TransportEvent};

/// Something views may need to redraw.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    Connection(ConnectionState),
    Presence { username: String, online: bool },
    /// Presence replaced by an `init` snapshot.
    PresenceSeeded { online: usize },
    Shift(u32),
    /// Opaque game-state fields were merged into [`SessionState::game`].
    GameState,
    /// Application message the core does not interpret.
    Forward { kind: String, data: Map<String, Value> },
}

#[derive(Debug, Clone)]
pub struct SessionState {
    router: SessionRouter,
    shift: ShiftOffset,
    presence: PresenceTracker,
    game: Map<String, Value>,
    connection: ConnectionState,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(SessionRouter::default())
    }
}

impl SessionState {
    #[must_use]
    pub fn new(router: SessionRouter) -> Self {
        Self {
            router,
            shift: ShiftOffset::new(router),
            presence: PresenceTracker::new(),
            game: Map::new(),
            connection: ConnectionState::Idle,
        }
    }

    #[must_use]
    pub fn router(&self) -> SessionRouter {
        self.router
    }

    /// Current shift, normalized into `0..N`.
    #[must_use]
    pub fn shift(&self) -> u32 {
        self.shift.get()
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Merged opaque game-state fields (temperature, power, modes, ...).
    #[must_use]
    pub fn game(&self) -> &Map<String, Value> {
        &self.game
    }

    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Agent currently serving `slot`.
    #[must_use]
    pub fn agent_for_slot(&self, slot: u32) -> u32 {
        self.shift.agent_for_slot(slot)
    }

    /// Both sides of `slot`'s current pairing are online.
    #[must_use]
    pub fn is_slot_fully_active(&self, slot: u32) -> bool {
        self.presence
            .is_slot_fully_active(self.router, slot, i64::from(self.shift.get()))
    }

    /// Seed the shift from an out-of-band source (the REST control snapshot)
    /// before the first push arrives.
    pub fn seed_shift(&mut self, raw: i64) -> Option<SessionUpdate> {
        self.apply_shift(raw)
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Fold one transport event into the state.
    pub fn apply(&mut self, event: TransportEvent) -> Vec<SessionUpdate> {
        match event {
            TransportEvent::State(state) => self.apply_connection(state),
            TransportEvent::Message(msg) => self.apply_message(msg),
        }
    }

    fn apply_connection(&mut self, state: ConnectionState) -> Vec<SessionUpdate> {
        if state == self.connection {
            return Vec::new();
        }
        self.connection = state;
        if state == ConnectionState::Connected && self.presence.online_count() > 0 {
            debug!(stale = self.presence.online_count(), "clearing presence on connect");
            self.presence.clear();
        }
        vec![SessionUpdate::Connection(state)]
    }

    fn apply_message(&mut self, msg: Inbound) -> Vec<SessionUpdate> {
        match msg {
            Inbound::StatusUpdate(update) => self.apply_status(update).into_iter().collect(),
            Inbound::GameStateUpdate(update) => self.apply_game_state(update),
            Inbound::Init(snapshot) => self.apply_init(snapshot),
            Inbound::Other { kind, data } => vec![SessionUpdate::Forward { kind, data }],
            // Heartbeat frames are consumed by the transport.
            Inbound::Ping | Inbound::Pong => Vec::new(),
        }
    }

    fn apply_status(&mut self, update: StatusUpdate) -> Option<SessionUpdate> {
        let online = update.is_online();
        let changed = if online {
            self.presence.mark_online(&update.username)
        } else {
            self.presence.mark_offline(&update.username)
        };
        changed.then(|| SessionUpdate::Presence { username: update.username, online })
    }

    fn apply_game_state(&mut self, update: GameStateUpdate) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        if let Some(raw) = update.shift {
            updates.extend(self.apply_shift(raw));
        }
        if !update.fields.is_empty() {
            self.game.extend(update.fields);
            updates.push(SessionUpdate::GameState);
        }
        updates
    }

    fn apply_init(&mut self, snapshot: InitSnapshot) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        if let Some(raw) = snapshot.shift {
            updates.extend(self.apply_shift(raw));
        }

        let online = snapshot.online_usernames();
        let mut fields = snapshot.fields;
        if let Some(temperature) = snapshot.temperature.and_then(serde_json::Number::from_f64) {
            fields.insert("temperature".to_owned(), Value::Number(temperature));
        }
        if !fields.is_empty() {
            self.game.extend(fields);
            updates.push(SessionUpdate::GameState);
        }

        if let Some(online) = online {
            self.presence.reset_and_seed(online);
            updates.push(SessionUpdate::PresenceSeeded { online: self.presence.online_count() });
        }
        updates
    }

    fn apply_shift(&mut self, raw: i64) -> Option<SessionUpdate> {
        let before = self.shift.get();
        let after = self.shift.set(raw);
        (before != after).then_some(SessionUpdate::Shift(after))
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
