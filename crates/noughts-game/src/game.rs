//! The authoritative per-game state machine.
//!
//! A [`Game`] owns the board, the symbol bindings, the spectator set, and
//! the turn pointer. It is generic over the participant key `P` so the
//! rules can be exercised without any networking: the server plugs in its
//! connection ids, tests plug in plain integers.
//!
//! ```text
//! Open(0 players) → Open(1 player) → Active → Terminal(win | draw | abandoned)
//! ```
//!
//! Terminal is absorbing. The game holds no locks of its own; callers
//! serialize access (the server runs each game inside its own actor task).

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::{Board, GameError, Symbol};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What a participant is allowed to do in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RoleRepr", into = "RoleRepr")]
pub enum Role {
    /// Bound to a symbol; may move on that symbol's turn.
    Player(Symbol),
    /// Read-only observer.
    Spectator,
}

impl Role {
    /// Returns the bound symbol, or `None` for spectators.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Self::Player(symbol) => Some(symbol),
            Self::Spectator => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(symbol) => write!(f, "{symbol}"),
            Self::Spectator => write!(f, "spectator"),
        }
    }
}

/// Wire shape of [`Role`]: a single flat string.
#[derive(Clone, Copy, Serialize, Deserialize)]
enum RoleRepr {
    X,
    O,
    #[serde(rename = "spectator")]
    Spectator,
}

impl From<RoleRepr> for Role {
    fn from(repr: RoleRepr) -> Self {
        match repr {
            RoleRepr::X => Self::Player(Symbol::X),
            RoleRepr::O => Self::Player(Symbol::O),
            RoleRepr::Spectator => Self::Spectator,
        }
    }
}

impl From<Role> for RoleRepr {
    fn from(role: Role) -> Self {
        match role {
            Role::Player(Symbol::X) => Self::X,
            Role::Player(Symbol::O) => Self::O,
            Role::Spectator => Self::Spectator,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome / Phase / Snapshot
// ---------------------------------------------------------------------------

/// How a game ended. Exactly one applies once a game is terminal.
///
/// JSON: `{"result": "win", "winner": "X"}`, `{"result": "draw"}`,
/// `{"result": "abandoned"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "winner", rename_all = "snake_case")]
pub enum Outcome {
    /// Three in a row.
    Win(Symbol),
    /// Full board, no line.
    Draw,
    /// A bound player left before the game finished.
    Abandoned,
}

/// Where a game is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fewer than two players bound; `players` is 0 or 1.
    Open { players: usize },
    /// Both symbols bound and no terminal outcome yet.
    Active,
    /// Finished. No further mutation is possible.
    Terminal(Outcome),
}

impl Phase {
    /// Returns `true` once the game can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { players } => write!(f, "Open({players})"),
            Self::Active => write!(f, "Active"),
            Self::Terminal(Outcome::Win(symbol)) => write!(f, "Terminal(win {symbol})"),
            Self::Terminal(Outcome::Draw) => write!(f, "Terminal(draw)"),
            Self::Terminal(Outcome::Abandoned) => write!(f, "Terminal(abandoned)"),
        }
    }
}

/// What observers see after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub board: Board,
    pub current_turn: Symbol,
    pub game_over: bool,
    pub winner: Option<Symbol>,
    /// Why the game ended; `None` while it is still running.
    pub outcome: Option<Outcome>,
    /// `true` while a symbol is still unbound and the game is not over.
    #[serde(default)]
    pub waiting_for_opponent: bool,
}

impl Snapshot {
    /// Returns `true` if this snapshot reports a departed player.
    pub fn is_abandoned(&self) -> bool {
        self.outcome == Some(Outcome::Abandoned)
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One game's authoritative state.
#[derive(Debug, Clone)]
pub struct Game<P> {
    board: Board,
    /// Indexed by [`Symbol::index`]. A slot is filled at most once.
    players: [Option<P>; 2],
    spectators: HashSet<P>,
    /// Participants that held a slot and then left.
    departed: HashSet<P>,
    current_turn: Symbol,
    outcome: Option<Outcome>,
}

impl<P: Copy + Eq + Hash> Default for Game<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + Eq + Hash> Game<P> {
    /// A fresh game: empty board, no players, `X` to move.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            players: [None, None],
            spectators: HashSet::new(),
            departed: HashSet::new(),
            current_turn: Symbol::FIRST,
            outcome: None,
        }
    }

    /// Binds `participant` to a role.
    ///
    /// The first two distinct participants receive `X` and `O`; everyone
    /// after that, and everyone arriving once the game is terminal, becomes
    /// a spectator. Joining twice returns the role already held.
    ///
    /// # Errors
    /// [`GameError::SessionTerminated`] if `participant` held a symbol and
    /// has since left. Player status is never restored.
    pub fn join(&mut self, participant: P) -> Result<Role, GameError> {
        if let Some(role) = self.role_of(participant) {
            return Ok(role);
        }
        if self.departed.contains(&participant) {
            return Err(GameError::SessionTerminated);
        }
        if self.outcome.is_none() {
            for symbol in [Symbol::X, Symbol::O] {
                let slot = &mut self.players[symbol.index()];
                if slot.is_none() {
                    *slot = Some(participant);
                    return Ok(Role::Player(symbol));
                }
            }
        }
        self.spectators.insert(participant);
        Ok(Role::Spectator)
    }

    /// Places the sender's symbol at `(row, col)`.
    ///
    /// The symbol always comes from the sender's binding, never from the
    /// request. On success the outcome is updated, the turn flips, and the
    /// new snapshot is returned. On failure nothing changes.
    ///
    /// # Errors
    /// In the order checked: [`GameError::GameOver`],
    /// [`GameError::SpectatorCannotMove`], [`GameError::WaitingForOpponent`],
    /// [`GameError::NotYourTurn`], [`GameError::IllegalMove`].
    pub fn make_move(
        &mut self,
        participant: P,
        row: usize,
        col: usize,
    ) -> Result<Snapshot, GameError> {
        if self.outcome.is_some() {
            return Err(GameError::GameOver);
        }
        let symbol = self
            .symbol_of(participant)
            .ok_or(GameError::SpectatorCannotMove)?;
        if self.players.iter().any(Option::is_none) {
            return Err(GameError::WaitingForOpponent);
        }
        if symbol != self.current_turn {
            return Err(GameError::NotYourTurn);
        }

        let board = self.board.apply(row, col, symbol)?;
        self.board = board;

        if let Some(winner) = board.winner() {
            self.outcome = Some(Outcome::Win(winner));
        } else if board.is_full() {
            self.outcome = Some(Outcome::Draw);
        }
        self.current_turn = self.current_turn.opponent();

        Ok(self.snapshot())
    }

    /// Removes `participant` from the game.
    ///
    /// A player leaving a running game ends it as abandoned and the
    /// resulting snapshot is returned for broadcast. Spectators, unknown
    /// participants, and players leaving a finished game produce `None`.
    pub fn disconnect(&mut self, participant: P) -> Option<Snapshot> {
        if self.spectators.remove(&participant) {
            return None;
        }
        self.symbol_of(participant)?;

        let first_departure = self.departed.insert(participant);
        if self.outcome.is_none() && first_departure {
            self.outcome = Some(Outcome::Abandoned);
            return Some(self.snapshot());
        }
        None
    }

    /// The current state as sent to observers.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.board,
            current_turn: self.current_turn,
            game_over: self.outcome.is_some(),
            winner: match self.outcome {
                Some(Outcome::Win(symbol)) => Some(symbol),
                _ => None,
            },
            outcome: self.outcome,
            waiting_for_opponent: self.outcome.is_none() && self.player_count() < 2,
        }
    }

    /// The lifecycle phase.
    pub fn phase(&self) -> Phase {
        match self.outcome {
            Some(outcome) => Phase::Terminal(outcome),
            None => match self.player_count() {
                2 => Phase::Active,
                players => Phase::Open { players },
            },
        }
    }

    /// Returns the role `participant` currently holds, if it is still
    /// present in the game.
    pub fn role_of(&self, participant: P) -> Option<Role> {
        if self.departed.contains(&participant) {
            return None;
        }
        if let Some(symbol) = self.symbol_of(participant) {
            return Some(Role::Player(symbol));
        }
        self.spectators
            .contains(&participant)
            .then_some(Role::Spectator)
    }

    /// Every participant still present (players first, then spectators).
    pub fn participants(&self) -> Vec<P> {
        self.players
            .iter()
            .flatten()
            .filter(|p| !self.departed.contains(p))
            .chain(self.spectators.iter())
            .copied()
            .collect()
    }

    /// Number of symbols ever bound (0, 1 or 2).
    pub fn player_count(&self) -> usize {
        self.players.iter().flatten().count()
    }

    /// Number of spectators still present.
    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    /// Number of participants still present.
    pub fn connection_count(&self) -> usize {
        self.participants().len()
    }

    /// The board as it stands.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The symbol whose move is accepted next.
    pub fn current_turn(&self) -> Symbol {
        self.current_turn
    }

    /// Returns `true` once the game has an outcome.
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    fn symbol_of(&self, participant: P) -> Option<Symbol> {
        [Symbol::X, Symbol::O]
            .into_iter()
            .find(|s| self.players[s.index()] == Some(participant))
    }
}
