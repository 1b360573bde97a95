//! Plain-text rendering for terminal output.

use std::fmt::Write as _;

use iris::monitor::{SlotRow, indicator, monitor_rows};
use iris::state::SessionState;
use iris::{ConnectionState, SessionRouter};

/// `slot -> agent` table for one shift.
pub fn routing_table(router: SessionRouter, shift: i64) -> String {
    let mut out = format!("shift {}\n", router.normalize_shift(shift));
    out.push_str("slot  agent\n");
    for (slot, agent) in router.table(shift) {
        let _ = writeln!(out, "{slot:>4}  agent{agent}");
    }
    out
}

/// Status line for the connection indicator.
pub fn status_line(state: ConnectionState) -> String {
    let ind = indicator(state);
    let marker = if ind.pulsing { "~" } else { "*" };
    format!("{marker} {} [{}]", ind.label, ind.color)
}

/// Full monitor frame: status, shift, one line per slot, and the live count.
pub fn monitor(state: &SessionState) -> String {
    let rows = monitor_rows(state);
    let mut out = status_line(state.connection());
    let _ = writeln!(out, "\nshift {}  online {}", state.shift(), state.presence().online_count());
    out.push_str("slot  user      agent     live\n");
    for row in &rows {
        out.push_str(&slot_line(row));
        out.push('\n');
    }
    let live = rows.iter().filter(|r| r.live).count();
    let _ = writeln!(out, "{live}/{} sessions live", rows.len());
    out
}

fn slot_line(row: &SlotRow) -> String {
    format!(
        "{:>4}  {:<8}  {:<8}  {}",
        row.slot,
        with_dot(&row.user.to_string(), row.user_online),
        with_dot(&row.agent.to_string(), row.agent_online),
        if row.live { "yes" } else { "-" },
    )
}

fn with_dot(name: &str, online: bool) -> String {
    if online { format!("{name}+") } else { name.to_owned() }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
