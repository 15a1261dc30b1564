//! First-class move types.
//!
//! A [`Move`] is a player's intent. It is validated by the rule engine
//! before anything is applied, and the completed form (with captures filled
//! in) is what lands in the session history.

use crate::board::BoardError;
use crate::position::Position;
use crate::types::Side;
use serde::{Deserialize, Serialize};

/// A move from one square to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Square the piece starts on.
    pub from: Position,
    /// Square the piece lands on.
    pub to: Position,
    /// Squares of pieces jumped by this move; empty for a simple step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captured: Vec<Position>,
}

impl Move {
    /// Creates a move without declared captures.
    pub fn new(from: Position, to: Position) -> Self {
        Self {
            from,
            to,
            captured: Vec::new(),
        }
    }

    /// Creates a move from raw coordinates.
    pub fn from_coords(
        origin_row: u8,
        origin_col: u8,
        dest_row: u8,
        dest_col: u8,
    ) -> Result<Self, BoardError> {
        Ok(Self::new(
            Position::new(origin_row, origin_col)?,
            Position::new(dest_row, dest_col)?,
        ))
    }

    /// Returns true if this move jumps at least one piece.
    pub fn is_capture(&self) -> bool {
        !self.captured.is_empty()
    }

    /// A move is well-formed when origin and destination differ and both are playable.
    pub fn is_well_formed(&self) -> bool {
        self.from != self.to && self.from.is_playable() && self.to.is_playable()
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sep = if self.is_capture() { 'x' } else { '-' };
        write!(f, "{}{}{}", self.from, sep, self.to)
    }
}

/// Wire form of a move submission, coordinates 0-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCoords {
    /// Origin row.
    pub origin_row: u8,
    /// Origin column.
    pub origin_col: u8,
    /// Destination row.
    pub dest_row: u8,
    /// Destination column.
    pub dest_col: u8,
}

impl MoveCoords {
    /// Converts to a validated [`Move`].
    pub fn to_move(self) -> Result<Move, BoardError> {
        Move::from_coords(self.origin_row, self.origin_col, self.dest_row, self.dest_col)
    }
}

impl From<&Move> for MoveCoords {
    fn from(mv: &Move) -> Self {
        Self {
            origin_row: mv.from.row(),
            origin_col: mv.from.col(),
            dest_row: mv.to.row(),
            dest_col: mv.to.col(),
        }
    }
}

/// An accepted move as recorded in the session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// Side that made the move.
    pub side: Side,
    /// The completed move, captures filled in.
    #[serde(rename = "move")]
    pub mv: Move,
    /// Whether the moving man was promoted.
    pub promoted: bool,
}

impl std::fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.side, self.mv)?;
        if self.promoted {
            write!(f, "=K")?;
        }
        Ok(())
    }
}
