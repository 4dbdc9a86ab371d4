//! Game rules for Noughts.
//!
//! Two layers, both pure and synchronous:
//!
//! - **Board engine** ([`Board`], [`Cell`], [`Symbol`]): legality, win and
//!   draw detection over a 3×3 grid.
//! - **Game state machine** ([`Game`]): symbol bindings, spectators, turn
//!   order, and the terminal outcome. Produces [`Snapshot`]s for observers.
//!
//! Nothing here does I/O or locking. The session layer decides how calls
//! are serialized and where snapshots go.

mod board;
mod error;
mod game;

pub use board::{Board, Cell, SIZE, Symbol};
pub use error::GameError;
pub use game::{Game, Outcome, Phase, Role, Snapshot};
