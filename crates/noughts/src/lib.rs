//! # Noughts
//!
//! Authoritative multiplayer noughts and crosses over WebSocket.
//!
//! The server owns every game. Clients create a game, share its id, join
//! it as `X`, `O` or a spectator, and send moves; the server validates each
//! move inside the game's own actor and pushes the resulting state to
//! everybody bound to that game.
//!
//! ```text
//! WebSocket ─→ handler (per connection) ─→ registry ─→ session actor (per game)
//!     ↑                                                      │
//!     └──────────── writer task ←── outbox ←─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use noughts::prelude::*;
//!
//! # async fn start() -> Result<(), NoughtsError> {
//! let server = NoughtsServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{
    ConfigError, ENV_BIND, ENV_IDLE_TIMEOUT_SECS, ENV_UNCLAIMED_TTL_SECS, ServerConfig,
};
pub use error::NoughtsError;
pub use server::{NoughtsServer, NoughtsServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{ConfigError, NoughtsError, NoughtsServer, NoughtsServerBuilder, ServerConfig};
    pub use noughts_protocol::{
        Board, Cell, ClientEvent, Codec, Envelope, ErrorKind, GameError, GameId, JsonCodec,
        Outcome, Role, ServerEvent, Snapshot, Symbol,
    };
}
