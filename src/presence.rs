//! Online/offline tracking for users and agents.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server announces each identity coming and going with a
//! `status_update` push. The tracker keeps the resulting set keyed by logical
//! username and answers per-slot questions through the [`SessionRouter`].
//! It holds no history: a fresh connection starts from an empty set until
//! the server re-announces presence.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::router::SessionRouter;

// =============================================================================
// IDENTITY
// =============================================================================

/// A logical account name as the routing model sees it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    /// `user{k}`: a subject pinned to slot `k`.
    User(u32),
    /// `agent{k}`: an operator whose slot rotates with the shift.
    Agent(u32),
    /// Admin, root, or anything else outside routing scope.
    Other(String),
}

impl Identity {
    /// Classify a username. Only `user<digits>` and `agent<digits>` with a
    /// positive index are routable.
    #[must_use]
    pub fn parse(username: &str) -> Self {
        let indexed = |prefix: &str| {
            username
                .strip_prefix(prefix)
                .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|rest| rest.parse::<u32>().ok())
                .filter(|n| *n > 0)
        };
        if let Some(k) = indexed("user") {
            Self::User(k)
        } else if let Some(k) = indexed("agent") {
            Self::Agent(k)
        } else {
            Self::Other(username.to_owned())
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(k) => write!(f, "user{k}"),
            Self::Agent(k) => write!(f, "agent{k}"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

// =============================================================================
// TRACKER
// =============================================================================

/// Set of currently connected identities.
#[derive(Clone, Debug, Default)]
pub struct PresenceTracker {
    online: HashSet<String>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the identity was not already online.
    pub fn mark_online(&mut self, username: &str) -> bool {
        self.online.insert(username.to_owned())
    }

    /// Returns `true` if the identity was online.
    pub fn mark_offline(&mut self, username: &str) -> bool {
        self.online.remove(username)
    }

    #[must_use]
    pub fn is_online(&self, username: &str) -> bool {
        self.online.contains(username)
    }

    #[must_use]
    pub fn is_identity_online(&self, identity: &Identity) -> bool {
        self.is_online(&identity.to_string())
    }

    /// Both the subject pinned to `slot` and the agent serving it are
    /// connected, i.e. the conversation is live.
    #[must_use]
    pub fn is_slot_fully_active(&self, router: SessionRouter, slot: u32, shift: i64) -> bool {
        let slot = router.clamp_slot(slot);
        let agent = router.agent_for_slot(slot, shift);
        self.is_identity_online(&Identity::User(slot))
            && self.is_identity_online(&Identity::Agent(agent))
    }

    /// Replace the whole set with a server snapshot.
    pub fn reset_and_seed<I, S>(&mut self, usernames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.online = usernames.into_iter().map(Into::into).collect();
    }

    pub fn clear(&mut self) {
        self.online.clear();
    }

    #[must_use]
    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Online usernames in sorted order.
    #[must_use]
    pub fn online(&self) -> BTreeSet<&str> {
        self.online.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
