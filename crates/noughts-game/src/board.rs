//! The board engine: pure functions over a 3×3 grid.
//!
//! Nothing in here knows about players, connections, or turns. A [`Board`]
//! is a small `Copy` value, so [`Board::apply`] hands back a new board and
//! leaves the original untouched.

use serde::{Deserialize, Serialize};

use crate::GameError;

/// Side length of the board. The game only supports the classic 3×3 grid.
pub const SIZE: usize = 3;

/// Every line that wins the game: 3 rows, 3 columns, 2 diagonals.
const LINES: [[(usize, usize); 3]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// One of the two markers a player can be bound to.
///
/// Serializes as the bare strings `"X"` and `"O"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The symbol that moves first in every game.
    pub const FIRST: Symbol = Symbol::X;

    /// Returns the other symbol.
    pub fn opponent(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    /// Slot index used for per-symbol arrays (`X` = 0, `O` = 1).
    pub(crate) fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::O => 1,
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::O => write!(f, "O"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A single square of the board.
///
/// On the wire a cell is `null` when empty, otherwise the symbol string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Symbol>", into = "Option<Symbol>")]
pub enum Cell {
    #[default]
    Empty,
    Taken(Symbol),
}

impl Cell {
    /// Returns `true` if nobody has marked this cell yet.
    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the symbol in this cell, if any.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Self::Empty => None,
            Self::Taken(symbol) => Some(symbol),
        }
    }
}

impl From<Option<Symbol>> for Cell {
    fn from(value: Option<Symbol>) -> Self {
        value.map_or(Self::Empty, Self::Taken)
    }
}

impl From<Cell> for Option<Symbol> {
    fn from(cell: Cell) -> Self {
        cell.symbol()
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// The 3×3 grid.
///
/// Serializes transparently as a nested array, row-major:
/// `[[null, "X", null], [null, null, null], ["O", null, null]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([[Cell; SIZE]; SIZE]);

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell at `(row, col)`, or `None` if out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.0.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Returns the rows of the grid.
    pub fn rows(&self) -> &[[Cell; SIZE]; SIZE] {
        &self.0
    }

    /// Returns a new board with `symbol` placed at `(row, col)`.
    ///
    /// # Errors
    /// [`GameError::IllegalMove`] if the coordinates fall outside the grid
    /// or the cell is already taken.
    pub fn apply(&self, row: usize, col: usize, symbol: Symbol) -> Result<Board, GameError> {
        match self.cell(row, col) {
            Some(Cell::Empty) => {
                let mut next = *self;
                next.0[row][col] = Cell::Taken(symbol);
                Ok(next)
            }
            _ => Err(GameError::IllegalMove { row, col }),
        }
    }

    /// Returns the symbol holding a complete line, if any.
    ///
    /// Lines are checked rows first, then columns, then diagonals. Under
    /// legal play at most one symbol can ever hold a line.
    pub fn winner(&self) -> Option<Symbol> {
        LINES.iter().find_map(|line| {
            let [a, b, c] = line.map(|(r, c)| self.0[r][c]);
            match a {
                Cell::Taken(symbol) if a == b && b == c => Some(symbol),
                _ => None,
            }
        })
    }

    /// Returns `true` when no empty cell remains.
    pub fn is_full(&self) -> bool {
        self.0.iter().flatten().all(|cell| !cell.is_empty())
    }
}
