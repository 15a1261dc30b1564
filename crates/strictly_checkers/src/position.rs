//! Board coordinates.

use crate::board::{BOARD_SIZE, BoardError};
use serde::{Deserialize, Serialize};

/// A square coordinate, row and column each in `0..8`.
///
/// Row 0 is White's home row. Positions render in algebraic notation with
/// columns `a`-`h` and ranks counted from the bottom of Black's view, so
/// `(0, 1)` is `b8` and `(7, 0)` is `a1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPosition", into = "RawPosition")]
pub struct Position {
    row: u8,
    col: u8,
}

#[derive(Serialize, Deserialize)]
struct RawPosition {
    row: u8,
    col: u8,
}

impl Position {
    /// Creates a position, failing with [`BoardError::OutOfBounds`] outside the board.
    pub fn new(row: u8, col: u8) -> Result<Self, BoardError> {
        if usize::from(row) >= BOARD_SIZE || usize::from(col) >= BOARD_SIZE {
            return Err(BoardError::OutOfBounds { row, col });
        }
        Ok(Self { row, col })
    }

    /// Row index.
    pub fn row(&self) -> u8 {
        self.row
    }

    /// Column index.
    pub fn col(&self) -> u8 {
        self.col
    }

    /// Returns true for dark (playable) squares.
    pub fn is_playable(&self) -> bool {
        (self.row + self.col) % 2 == 1
    }

    /// Returns the position offset by `(dr, dc)`, or `None` off the board.
    pub fn offset(&self, dr: i8, dc: i8) -> Option<Self> {
        let row = i16::from(self.row) + i16::from(dr);
        let col = i16::from(self.col) + i16::from(dc);
        let row = u8::try_from(row).ok()?;
        let col = u8::try_from(col).ok()?;
        Self::new(row, col).ok()
    }

    /// Signed row and column distance to `other`.
    pub fn delta(&self, other: Position) -> (i8, i8) {
        // Both coordinates are below 8, so the casts cannot truncate.
        (
            other.row as i8 - self.row as i8,
            other.col as i8 - self.col as i8,
        )
    }

    /// Returns true if `other` lies on a diagonal through this position.
    pub fn is_diagonal_to(&self, other: Position) -> bool {
        let (dr, dc) = self.delta(other);
        dr != 0 && dr.abs() == dc.abs()
    }

    /// Every square on the board in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE as u8).flat_map(|row| (0..BOARD_SIZE as u8).map(move |col| Position { row, col }))
    }
}

impl TryFrom<RawPosition> for Position {
    type Error = BoardError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        Position::new(raw.row, raw.col)
    }
}

impl From<Position> for RawPosition {
    fn from(pos: Position) -> Self {
        RawPosition {
            row: pos.row,
            col: pos.col,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = char::from(b'a' + self.col);
        write!(f, "{}{}", file, BOARD_SIZE as u8 - self.row)
    }
}
