//! Error types for game rules.

/// A request the game refused.
///
/// Every variant is local and recoverable: the game state is left exactly
/// as it was, and the error is reported back to whoever asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The sender holds a symbol, but it is the other symbol's turn.
    #[error("not your turn")]
    NotYourTurn,

    /// The sender has no symbol bound in this game.
    #[error("spectators cannot make moves")]
    SpectatorCannotMove,

    /// The game already reached a terminal state.
    #[error("game is over")]
    GameOver,

    /// The coordinates are off the board or the cell is taken.
    #[error("illegal move at row {row}, col {col}")]
    IllegalMove { row: usize, col: usize },

    /// A former player tried to join again after leaving.
    #[error("you left this game and cannot rejoin")]
    SessionTerminated,

    /// A move arrived before the second player joined.
    #[error("waiting for an opponent to join")]
    WaitingForOpponent,
}
