//! Why a move was not sent.

use noughts_protocol::Symbol;

/// Reasons [`ClientView::request_move`](crate::ClientView::request_move)
/// refuses to produce a `make_move` event.
///
/// The gate is advisory. The server validates every move on its own; these
/// only spare a round trip for requests that are certain to be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveBlocked {
    /// No `player_assigned` has arrived yet.
    #[error("not assigned to the game yet")]
    Unassigned,

    #[error("spectators cannot move")]
    Spectator,

    /// A symbol is bound but no `game_state` has arrived, which means the
    /// opponent has not joined.
    #[error("waiting for an opponent")]
    WaitingForOpponent,

    #[error("game is over")]
    Finished,

    #[error("not your turn ({0} to move)")]
    NotYourTurn(Symbol),

    #[error("cell ({row}, {col}) is not on the board")]
    OutOfBounds { row: usize, col: usize },

    #[error("cell ({row}, {col}) is already taken")]
    CellTaken { row: usize, col: usize },
}
