//! Core of the IRIS dashboard client.
//!
//! SYSTEM CONTEXT
//! ==============
//! IRIS pairs `N` users with `N` agents over `N` session slots. Users stay
//! pinned to their slot; agents rotate as the game's shift offset advances.
//! Every dashboard view (admin monitor, user terminal, agent console) needs
//! the same three things:
//!
//! - [`router`]: which agent serves which slot at a given shift
//! - [`presence`]: who is connected right now
//! - [`transport`]: one resilient websocket feeding both
//!
//! [`state`] folds transport events into a single owned [`state::SessionState`],
//! [`session`] ties it to a live transport, and [`monitor`] projects it into
//! the admin grid.

pub mod config;
pub mod monitor;
pub mod presence;
pub mod router;
pub mod session;
pub mod state;
pub mod token;
pub mod transport;

pub use config::{ClientConfig, ConfigError, TransportConfig};
pub use router::{SessionRouter, ShiftOffset};
pub use session::DashboardSession;
pub use transport::{ConnectionState, TransportError};
