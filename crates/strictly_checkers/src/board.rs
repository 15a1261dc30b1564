//! The 8x8 checkers board.

use crate::position::Position;
use crate::types::{Piece, Side, Square};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Number of rows and columns.
pub const BOARD_SIZE: usize = 8;

/// Errors from board queries and placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum BoardError {
    /// Coordinates outside `0..8`.
    #[display("Position ({row}, {col}) is off the board")]
    OutOfBounds {
        /// Requested row.
        row: u8,
        /// Requested column.
        col: u8,
    },
    /// Pieces may only stand on dark squares.
    #[display("Square {_0} is not playable")]
    NotPlayable(#[error(not(source))] Position),
}

/// 8x8 board, indexed `[row][col]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    squares: [[Square; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Creates an empty board.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates the standard starting position: White men on the dark squares
    /// of rows 0-2, Black men on the dark squares of rows 5-7.
    #[instrument]
    pub fn standard() -> Self {
        let mut board = Self::empty();
        for pos in Position::all().filter(Position::is_playable) {
            let side = match pos.row() {
                0..=2 => Some(Side::White),
                5..=7 => Some(Side::Black),
                _ => None,
            };
            if let Some(side) = side {
                board.squares[usize::from(pos.row())][usize::from(pos.col())] =
                    Square::Occupied(Piece::man(side));
            }
        }
        board
    }

    /// Returns the square at a position.
    pub fn square(&self, pos: Position) -> Square {
        self.squares[usize::from(pos.row())][usize::from(pos.col())]
    }

    /// Returns the square at raw coordinates.
    pub fn at(&self, row: u8, col: u8) -> Result<Square, BoardError> {
        Position::new(row, col).map(|pos| self.square(pos))
    }

    /// Returns the piece at a position, if any.
    pub fn piece_at(&self, pos: Position) -> Option<Piece> {
        self.square(pos).piece()
    }

    /// Checks if a square is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.square(pos) == Square::Empty
    }

    /// Checks if raw coordinates name a playable square.
    pub fn is_playable(row: u8, col: u8) -> Result<bool, BoardError> {
        Position::new(row, col).map(|pos| pos.is_playable())
    }

    /// Places a piece, refusing light squares.
    pub fn place(&mut self, pos: Position, piece: Piece) -> Result<(), BoardError> {
        if !pos.is_playable() {
            return Err(BoardError::NotPlayable(pos));
        }
        self.squares[usize::from(pos.row())][usize::from(pos.col())] = Square::Occupied(piece);
        Ok(())
    }

    /// Removes and returns whatever stands on a square.
    pub fn remove(&mut self, pos: Position) -> Option<Piece> {
        let cell = &mut self.squares[usize::from(pos.row())][usize::from(pos.col())];
        std::mem::take(cell).piece()
    }

    /// Iterates over the positions and pieces of one side.
    pub fn pieces(&self, side: Side) -> impl Iterator<Item = (Position, Piece)> + '_ {
        Position::all().filter_map(move |pos| match self.square(pos) {
            Square::Occupied(piece) if piece.side == side => Some((pos, piece)),
            _ => None,
        })
    }

    /// Number of pieces a side has on the board.
    pub fn count(&self, side: Side) -> usize {
        self.pieces(side).count()
    }

    /// Rows of raw squares.
    pub fn rows(&self) -> &[[Square; BOARD_SIZE]; BOARD_SIZE] {
        &self.squares
    }

    /// Formats the board as a human-readable string, row 0 at the top.
    ///
    /// `w`/`b` are men, `W`/`B` kings, `.` an empty dark square.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for pos in Position::all() {
            if pos.col() == 0 {
                result.push_str(&format!("{} ", BOARD_SIZE as u8 - pos.row()));
            }
            let symbol = match self.square(pos).piece() {
                None if pos.is_playable() => '.',
                None => ' ',
                Some(piece) => match (piece.side, piece.is_king()) {
                    (Side::White, false) => 'w',
                    (Side::White, true) => 'W',
                    (Side::Black, false) => 'b',
                    (Side::Black, true) => 'B',
                },
            };
            result.push(symbol);
            if usize::from(pos.col()) == BOARD_SIZE - 1 {
                result.push('\n');
            }
        }
        result.push_str("  abcdefgh");
        result
    }
}
