//! Error types for the session layer.

use noughts_game::GameError;
use noughts_protocol::{ErrorKind, GameId};

/// Errors returned by session handles and the registry.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live session has this id. Also returned when the session's actor
    /// has already shut down.
    #[error("game {0} not found")]
    GameNotFound(GameId),

    /// The game refused the request. State is unchanged.
    #[error(transparent)]
    Game(#[from] GameError),
}

impl SessionError {
    /// The wire-level kind reported to the requesting connection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GameNotFound(_) => ErrorKind::GameNotFound,
            Self::Game(err) => ErrorKind::from(err),
        }
    }
}
