//! The client's mirror of one game.
//!
//! A [`ClientView`] is fed every [`ServerEvent`] the connection receives
//! and nothing else. It never applies a move on its own: the board it shows
//! is always the last `game_state` the server pushed.
//!
//! ```text
//! Unassigned ──player_assigned──→ Assigned(role)
//!                                    │ game_state with both players bound
//!                          ┌─────────┴─────────┐
//!                          ↓                   ↓
//!                   Playing(symbol)        Spectating
//!                          │                   │
//!                          └──game over / player_disconnected──→ Finished
//! ```
//!
//! `Finished` is absorbing.

use std::fmt;

use noughts_protocol::{Board, ClientEvent, ErrorKind, GameId, Role, ServerEvent, Snapshot, Symbol};

use crate::MoveBlocked;

/// Where the client is in its view of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Waiting for `player_assigned`.
    Unassigned,
    /// Role known, but no state showing both players bound yet. For a
    /// player this means the opponent has not joined.
    Assigned(Role),
    /// Bound to `symbol` in a running game.
    Playing(Symbol),
    /// Watching a running game.
    Spectating,
    /// The game ended (win, draw, or a player left).
    Finished,
}

/// An `error` event the server sent in reply to one of our requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Client-side state for one game, driven by server events.
#[derive(Debug, Clone)]
pub struct ClientView {
    game_id: GameId,
    phase: ClientPhase,
    role: Option<Role>,
    snapshot: Option<Snapshot>,
    player_departed: bool,
    last_error: Option<Rejection>,
}

impl ClientView {
    /// A view of `game_id` before anything has been received.
    pub fn new(game_id: impl Into<GameId>) -> Self {
        Self {
            game_id: game_id.into(),
            phase: ClientPhase::Unassigned,
            role: None,
            snapshot: None,
            player_departed: false,
            last_error: None,
        }
    }

    // -- Outbound requests --------------------------------------------------

    /// The event that asks the server for a new game.
    pub fn create_request() -> ClientEvent {
        ClientEvent::CreateGame
    }

    /// The event that binds this connection to the viewed game.
    pub fn join_request(&self) -> ClientEvent {
        ClientEvent::JoinGame {
            game_id: self.game_id.clone(),
        }
    }

    /// The event that leaves the viewed game.
    pub fn leave_request(&self) -> ClientEvent {
        ClientEvent::LeaveGame {
            game_id: self.game_id.clone(),
        }
    }

    /// Builds a `make_move` for `(row, col)` if the mirrored state allows
    /// it. The mirrored board is left untouched either way; it only changes
    /// when the server confirms with a `game_state`.
    ///
    /// # Errors
    /// The first [`MoveBlocked`] reason that applies.
    pub fn request_move(&self, row: usize, col: usize) -> Result<ClientEvent, MoveBlocked> {
        if let Err(reason) = self.check_move(row, col) {
            tracing::debug!(game_id = %self.game_id, row, col, %reason, "move blocked locally");
            return Err(reason);
        }
        Ok(ClientEvent::MakeMove {
            game_id: self.game_id.clone(),
            row,
            col,
            symbol: None,
        })
    }

    /// Returns `true` if clicking `(row, col)` should send a move.
    pub fn can_move(&self, row: usize, col: usize) -> bool {
        self.check_move(row, col).is_ok()
    }

    fn check_move(&self, row: usize, col: usize) -> Result<(), MoveBlocked> {
        let symbol = match self.phase {
            ClientPhase::Unassigned => return Err(MoveBlocked::Unassigned),
            ClientPhase::Assigned(Role::Spectator) | ClientPhase::Spectating => {
                return Err(MoveBlocked::Spectator);
            }
            ClientPhase::Assigned(Role::Player(_)) => {
                return Err(MoveBlocked::WaitingForOpponent);
            }
            ClientPhase::Finished => return Err(MoveBlocked::Finished),
            ClientPhase::Playing(symbol) => symbol,
        };
        let snapshot = self.snapshot.ok_or(MoveBlocked::WaitingForOpponent)?;

        if snapshot.current_turn != symbol {
            return Err(MoveBlocked::NotYourTurn(snapshot.current_turn));
        }
        match snapshot.board.cell(row, col) {
            None => Err(MoveBlocked::OutOfBounds { row, col }),
            Some(cell) if !cell.is_empty() => Err(MoveBlocked::CellTaken { row, col }),
            Some(_) => Ok(()),
        }
    }

    // -- Inbound events -----------------------------------------------------

    /// Folds one server event into the view.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::PlayerAssigned { symbol } => {
                self.role = Some(*symbol);
            }
            ServerEvent::GameState(snapshot) => {
                self.snapshot = Some(*snapshot);
                if snapshot.is_abandoned() {
                    self.player_departed = true;
                }
            }
            ServerEvent::PlayerDisconnected => {
                self.player_departed = true;
            }
            ServerEvent::Error { kind, message } => {
                tracing::debug!(game_id = %self.game_id, ?kind, %message, "request rejected");
                self.last_error = Some(Rejection {
                    kind: *kind,
                    message: message.clone(),
                });
                return;
            }
            ServerEvent::GameCreated { .. } | ServerEvent::HeartbeatAck { .. } => return,
        }
        self.reconcile();
    }

    fn reconcile(&mut self) {
        let next = match (self.phase, self.role, self.snapshot) {
            (ClientPhase::Finished, _, _) => ClientPhase::Finished,
            (_, None, _) => ClientPhase::Unassigned,
            (_, Some(_), _) if self.player_departed => ClientPhase::Finished,
            (_, Some(_), Some(snapshot)) if snapshot.game_over => ClientPhase::Finished,
            (_, Some(role), None) => ClientPhase::Assigned(role),
            (_, Some(role), Some(snapshot)) if snapshot.waiting_for_opponent => {
                ClientPhase::Assigned(role)
            }
            (_, Some(Role::Player(symbol)), Some(_)) => ClientPhase::Playing(symbol),
            (_, Some(Role::Spectator), Some(_)) => ClientPhase::Spectating,
        };
        if next != self.phase {
            tracing::debug!(
                game_id = %self.game_id,
                from = ?self.phase,
                to = ?next,
                "client phase changed"
            );
            self.phase = next;
        }
    }

    // -- Rendering ----------------------------------------------------------

    /// One line describing the game from this client's point of view.
    pub fn status(&self) -> String {
        match self.phase {
            ClientPhase::Unassigned => match &self.last_error {
                Some(rejection) => rejection.message.clone(),
                None => format!("Joining game {}...", self.game_id),
            },
            ClientPhase::Assigned(Role::Spectator) => {
                "You are watching this game as a spectator.".to_string()
            }
            ClientPhase::Assigned(Role::Player(_)) => {
                "Waiting for an opponent to join.".to_string()
            }
            ClientPhase::Spectating => match self.current_turn() {
                Some(turn) => format!("You are watching. Current turn: {turn}"),
                None => "You are watching.".to_string(),
            },
            ClientPhase::Playing(symbol) => {
                if self.current_turn() == Some(symbol) {
                    "Your turn".to_string()
                } else {
                    "Opponent's turn".to_string()
                }
            }
            ClientPhase::Finished if self.player_departed => match self.role {
                Some(Role::Spectator) => "A player has disconnected.".to_string(),
                _ => "The other player has disconnected.".to_string(),
            },
            ClientPhase::Finished => match self.snapshot.and_then(|s| s.winner) {
                Some(winner) => format!("Game Over! Player {winner} wins!"),
                None => "Game Over! It's a draw!".to_string(),
            },
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// The last state pushed by the server.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn board(&self) -> Option<&Board> {
        self.snapshot.as_ref().map(|s| &s.board)
    }

    pub fn current_turn(&self) -> Option<Symbol> {
        self.snapshot.map(|s| s.current_turn)
    }

    /// Returns `true` once a player has left the game.
    pub fn player_departed(&self) -> bool {
        self.player_departed
    }

    /// The most recent rejection, kept until the next one or until taken.
    pub fn last_error(&self) -> Option<&Rejection> {
        self.last_error.as_ref()
    }

    /// Removes and returns the most recent rejection.
    pub fn take_error(&mut self) -> Option<Rejection> {
        self.last_error.take()
    }
}

// =========================================================================
// Tests
// =========================================================================
