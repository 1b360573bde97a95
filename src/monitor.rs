//! View model of the admin session monitor.
//!
//! One row per slot: the pinned user, the agent currently routed to it, each
//! side's presence, and whether the pair is fully live. Plus the connection
//! indicator every dashboard page shows.

use crate::presence::Identity;
use crate::state::SessionState;
use crate::transport::ConnectionState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRow {
    pub slot: u32,
    pub user: Identity,
    pub agent: Identity,
    pub user_online: bool,
    pub agent_online: bool,
    /// Both sides online.
    pub live: bool,
}

/// Rows for slots `1..=N` at the session's current shift.
#[must_use]
pub fn monitor_rows(state: &SessionState) -> Vec<SlotRow> {
    let presence = state.presence();
    state
        .router()
        .slots()
        .map(|slot| {
            let user = Identity::User(slot);
            let agent = Identity::Agent(state.agent_for_slot(slot));
            let user_online = presence.is_identity_online(&user);
            let agent_online = presence.is_identity_online(&agent);
            SlotRow { slot, user, agent, user_online, agent_online, live: user_online && agent_online }
        })
        .collect()
}

/// Rendering of the connection status dot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Indicator {
    pub label: &'static str,
    /// CSS hex colour.
    pub color: &'static str,
    pub pulsing: bool,
}

#[must_use]
pub fn indicator(state: ConnectionState) -> Indicator {
    let (label, color, pulsing) = match state {
        ConnectionState::Connected => ("Connected", "#22c55e", false),
        ConnectionState::Connecting => ("Connecting", "#eab308", true),
        ConnectionState::Disconnected => ("Disconnected, retrying", "#ef4444", true),
        ConnectionState::AuthFailed => ("Authentication failed", "#a855f7", false),
        ConnectionState::Error => ("Connection error", "#f97316", false),
        ConnectionState::Idle => ("Offline", "#6b7280", false),
    };
    Indicator { label, color, pulsing }
}

#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;
