//! Slot-to-agent routing.
//!
//! SYSTEM CONTEXT
//! ==============
//! Subjects are pinned: `user{k}` always talks through slot `k`. Agents
//! rotate: the server routes agent `a` to slot `((a - 1 + shift) mod N) + 1`.
//! Every view that needs "who serves slot k right now" goes through
//! [`SessionRouter::agent_for_slot`], the exact inverse of that relation.
//!
//! DESIGN
//! ======
//! The modulo is Euclidean (`rem_euclid`), so a negative intermediate such
//! as `slot - 1 - shift` never produces a negative index. Shift values come
//! from the server and wrap by definition; any `i64` is accepted and reduced
//! into `0..N` before the arithmetic. Slot and agent indices are
//! caller-validated, so an out-of-range index is a bug upstream: it trips a
//! debug assertion and is clamped in release builds instead of wrapping into
//! a plausible-looking but wrong mapping.

/// Number of communication slots in a standard IRIS game.
pub const DEFAULT_TOTAL_SESSIONS: u32 = 8;

/// Maps slots to the agents serving them for a fixed number of slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionRouter {
    total: u32,
}

impl Default for SessionRouter {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_SESSIONS)
    }
}

impl SessionRouter {
    /// # Panics
    ///
    /// Panics if `total` is zero.
    #[must_use]
    pub fn new(total: u32) -> Self {
        assert!(total > 0, "a game needs at least one session slot");
        Self { total }
    }

    /// Number of slots `N`.
    #[must_use]
    pub fn total(self) -> u32 {
        self.total
    }

    /// Reduce an arbitrary shift into `0..N`.
    #[must_use]
    pub fn normalize_shift(self, shift: i64) -> u32 {
        // rem_euclid result is in 0..total, which always fits u32.
        u32::try_from(shift.rem_euclid(i64::from(self.total))).unwrap_or(0)
    }

    /// Agent index (`1..=N`) currently serving `slot` (`1..=N`).
    #[must_use]
    pub fn agent_for_slot(self, slot: u32, shift: i64) -> u32 {
        let slot = self.checked_index(slot, "slot");
        self.wrap(i64::from(slot) - 1 - i64::from(self.normalize_shift(shift))) + 1
    }

    /// Slot (`1..=N`) that `agent` (`1..=N`) serves at `shift`.
    #[must_use]
    pub fn slot_for_agent(self, agent: u32, shift: i64) -> u32 {
        let agent = self.checked_index(agent, "agent");
        self.wrap(i64::from(agent) - 1 + i64::from(self.normalize_shift(shift))) + 1
    }

    /// `slot` forced into `1..=N`, under the same debug assertion as the
    /// routing calls.
    #[must_use]
    pub fn clamp_slot(self, slot: u32) -> u32 {
        self.checked_index(slot, "slot")
    }

    /// Full `(slot, agent)` table for one shift, ordered by slot.
    #[must_use]
    pub fn table(self, shift: i64) -> Vec<(u32, u32)> {
        (1..=self.total)
            .map(|slot| (slot, self.agent_for_slot(slot, shift)))
            .collect()
    }

    /// Iterator over every valid slot index.
    pub fn slots(self) -> impl Iterator<Item = u32> {
        1..=self.total
    }

    fn wrap(self, raw: i64) -> u32 {
        u32::try_from(raw.rem_euclid(i64::from(self.total))).unwrap_or(0)
    }

    fn checked_index(self, index: u32, what: &str) -> u32 {
        debug_assert!(
            (1..=self.total).contains(&index),
            "{what} {index} outside 1..={}",
            self.total
        );
        index.clamp(1, self.total)
    }
}

// =============================================================================
// SHIFT OFFSET
// =============================================================================

/// The process-wide rotation of agents over slots, always in `0..N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShiftOffset {
    value: u32,
    router: SessionRouter,
}

impl ShiftOffset {
    #[must_use]
    pub fn new(router: SessionRouter) -> Self {
        Self { value: 0, router }
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.value
    }

    /// Set from a server-pushed value; reduced mod N.
    pub fn set(&mut self, raw: i64) -> u32 {
        self.value = self.router.normalize_shift(raw);
        self.value
    }

    /// Advance by one, wrapping to zero after `N - 1`. This is what the
    /// server does on `shift_command`.
    pub fn increment(&mut self) -> u32 {
        self.value = (self.value + 1) % self.router.total();
        self.value
    }

    /// Agent serving `slot` at the current offset.
    #[must_use]
    pub fn agent_for_slot(self, slot: u32) -> u32 {
        self.router.agent_for_slot(slot, i64::from(self.value))
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
