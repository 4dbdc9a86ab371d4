//! Wire protocol for Noughts.
//!
//! - **Types** ([`Envelope`], [`ClientEvent`], [`ServerEvent`], [`GameId`],
//!   [`ErrorKind`]): the frames that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing that.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientEvent>) → Session (game actor)
//! ```
//!
//! Game-level types that appear inside events (`Snapshot`, `Role`,
//! `Symbol`, ...) are re-exported from `noughts-game` so clients only need
//! this crate.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use noughts_game::{Board, Cell, GameError, Outcome, Role, Snapshot, Symbol};
pub use types::{ClientEvent, Envelope, ErrorKind, GameId, ServerEvent};
