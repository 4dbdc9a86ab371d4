//! Game sessions for Noughts.
//!
//! Each game runs as an isolated Tokio task (actor model) that owns a
//! `noughts_game::Game` and the outboxes of every connection bound to it.
//!
//! # Key types
//!
//! - [`Registry`]: creates, looks up, and removes sessions by [`GameId`](noughts_protocol::GameId)
//! - [`SessionHandle`]: send join / move / disconnect requests to a session
//! - [`Outbox`]: where a session pushes events for one connection
//! - [`SessionError`]: `GameNotFound` or a rule violation
//!
//! ```text
//! Handler (above)  ← resolves ids, forwards requests, drains outboxes
//!     ↕
//! Session layer (this crate)  ← one actor per game, serialized mutation, fan-out
//!     ↕
//! Game rules (below)  ← pure board and turn logic
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{DEFAULT_CHANNEL_SIZE, Registry};
pub use session::{Departure, Outbox, SessionHandle, SessionInfo};
