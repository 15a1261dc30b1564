//! Core domain types for checkers.

use serde::{Deserialize, Serialize};

/// Side of the board a player controls.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    /// White (moves first, advances toward row 7).
    White,
    /// Black (advances toward row 0).
    Black,
}

impl Side {
    /// Returns the opposing side.
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Row direction a man of this side advances in.
    pub fn forward(self) -> i8 {
        match self {
            Side::White => 1,
            Side::Black => -1,
        }
    }

    /// Row on which a man of this side is promoted.
    pub fn promotion_row(self) -> u8 {
        match self {
            Side::White => 7,
            Side::Black => 0,
        }
    }
}

/// Rank of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    /// Unpromoted piece, moves only toward the opponent.
    Man,
    /// Promoted piece, moves diagonally in either direction.
    King,
}

/// A piece on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    /// Owner of the piece.
    pub side: Side,
    /// Whether the piece has been promoted.
    pub rank: Rank,
}

impl Piece {
    /// Creates an unpromoted piece.
    pub fn man(side: Side) -> Self {
        Self {
            side,
            rank: Rank::Man,
        }
    }

    /// Creates a king.
    pub fn king(side: Side) -> Self {
        Self {
            side,
            rank: Rank::King,
        }
    }

    /// Returns true for kings.
    pub fn is_king(&self) -> bool {
        self.rank == Rank::King
    }

    /// Returns the promoted version of this piece.
    pub fn promoted(self) -> Self {
        Self::king(self.side)
    }

    /// Row directions this piece may move or capture in.
    pub fn row_directions(&self) -> &'static [i8] {
        match (self.rank, self.side) {
            (Rank::King, _) => &[1, -1],
            (Rank::Man, Side::White) => &[1],
            (Rank::Man, Side::Black) => &[-1],
        }
    }
}

/// A square on the board.
///
/// On the wire a square is the integer code used by the original web
/// client: 0 empty, 1 white man, 2 black man, 3 white king, 4 black king.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Square {
    /// Empty square.
    #[default]
    Empty,
    /// Square occupied by a piece.
    Occupied(Piece),
}

impl Square {
    /// Returns the piece on this square, if any.
    pub fn piece(&self) -> Option<Piece> {
        match self {
            Square::Empty => None,
            Square::Occupied(piece) => Some(*piece),
        }
    }

    /// Returns true if the square holds a piece of `side`.
    pub fn is_side(&self, side: Side) -> bool {
        matches!(self, Square::Occupied(piece) if piece.side == side)
    }
}

impl From<Square> for u8 {
    fn from(square: Square) -> Self {
        match square.piece() {
            None => 0,
            Some(Piece {
                side: Side::White,
                rank: Rank::Man,
            }) => 1,
            Some(Piece {
                side: Side::Black,
                rank: Rank::Man,
            }) => 2,
            Some(Piece {
                side: Side::White,
                rank: Rank::King,
            }) => 3,
            Some(Piece {
                side: Side::Black,
                rank: Rank::King,
            }) => 4,
        }
    }
}

impl TryFrom<u8> for Square {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Square::Empty),
            1 => Ok(Square::Occupied(Piece::man(Side::White))),
            2 => Ok(Square::Occupied(Piece::man(Side::Black))),
            3 => Ok(Square::Occupied(Piece::king(Side::White))),
            4 => Ok(Square::Occupied(Piece::king(Side::Black))),
            other => Err(format!("invalid square code {other}")),
        }
    }
}
