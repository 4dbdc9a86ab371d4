//! Wire types: everything that travels between a client and the server.
//!
//! Every frame is an [`Envelope`] wrapping one event. Inbound frames carry a
//! [`ClientEvent`], outbound frames a [`ServerEvent`]. Events are internally
//! tagged with a snake_case `"type"` field so browser code can switch on it
//! directly:
//!
//! ```text
//! {"seq": 3, "timestamp": 1520,
//!  "event": {"type": "make_move", "game_id": "9c1e04ab", "row": 0, "col": 2}}
//! ```

use std::fmt;

use noughts_game::{GameError, Role, Snapshot, Symbol};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameId
// ---------------------------------------------------------------------------

/// Public, opaque identifier of a game session.
///
/// Clients only ever see this string; it is what goes into a shareable
/// link. Serializes as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Wraps an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for GameId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientEvent: client → server
// ---------------------------------------------------------------------------

/// Requests a client can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Start a new game. The reply carries its id.
    CreateGame,

    /// Bind this connection to a game as a player or spectator.
    JoinGame { game_id: GameId },

    /// Place this connection's symbol at `(row, col)`.
    ///
    /// `symbol` exists only so older clients that send it still decode.
    /// The server ignores it and uses the connection's own binding.
    MakeMove {
        game_id: GameId,
        row: usize,
        col: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<Symbol>,
    },

    /// Leave a game without closing the connection.
    LeaveGame { game_id: GameId },

    /// Keep-alive. The server echoes `client_time` back.
    Heartbeat { client_time: u64 },
}

// ---------------------------------------------------------------------------
// ServerEvent: server → client
// ---------------------------------------------------------------------------

/// Machine-readable reason attached to every [`ServerEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    GameNotFound,
    NotYourTurn,
    SpectatorCannotMove,
    GameOver,
    IllegalMove,
    SessionTerminated,
    WaitingForOpponent,
    /// The frame could not be decoded.
    InvalidMessage,
}

impl From<&GameError> for ErrorKind {
    fn from(err: &GameError) -> Self {
        match err {
            GameError::NotYourTurn => Self::NotYourTurn,
            GameError::SpectatorCannotMove => Self::SpectatorCannotMove,
            GameError::GameOver => Self::GameOver,
            GameError::IllegalMove { .. } => Self::IllegalMove,
            GameError::SessionTerminated => Self::SessionTerminated,
            GameError::WaitingForOpponent => Self::WaitingForOpponent,
        }
    }
}

/// Everything the server pushes to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Reply to `create_game`.
    GameCreated { game_id: GameId },

    /// Reply to `join_game`: `"X"`, `"O"` or `"spectator"`.
    PlayerAssigned { symbol: Role },

    /// The authoritative state after a change. Fields are flattened into
    /// the event object: `board`, `current_turn`, `game_over`, `winner`,
    /// `outcome`.
    GameState(Snapshot),

    /// A request from this connection was rejected. Only the requester
    /// receives this.
    Error { kind: ErrorKind, message: String },

    /// A player left and the game is over.
    PlayerDisconnected,

    /// Reply to `heartbeat`.
    HeartbeatAck { client_time: u64, server_time: u64 },
}

impl ServerEvent {
    /// Builds an error event from a kind and anything printable.
    pub fn error(kind: ErrorKind, message: impl fmt::Display) -> Self {
        Self::Error {
            kind,
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame.
///
/// `seq` counts frames per direction per connection; `timestamp` is
/// milliseconds since the sender started. Both default to 0 when a client
/// leaves them out, so a bare `{"event": {...}}` is a valid frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<E> {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub event: E,
}

impl<E> Envelope<E> {
    /// Wraps an event.
    pub fn new(seq: u64, timestamp: u64, event: E) -> Self {
        Self {
            seq,
            timestamp,
            event,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
