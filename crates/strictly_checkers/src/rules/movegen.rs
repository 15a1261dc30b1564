//! Move generation.

use crate::action::Move;
use crate::board::Board;
use crate::position::Position;
use crate::types::{Piece, Side};

const COL_DIRECTIONS: [i8; 2] = [-1, 1];

/// Simple steps available to the piece on `from`.
pub(super) fn steps_from(board: &Board, from: Position, piece: Piece) -> Vec<Move> {
    let mut moves = Vec::new();
    for &dr in piece.row_directions() {
        for dc in COL_DIRECTIONS {
            if let Some(to) = from.offset(dr, dc)
                && board.is_empty(to)
            {
                moves.push(Move::new(from, to));
            }
        }
    }
    moves
}

/// Single jumps available to the piece on `from`.
pub(super) fn jumps_from(board: &Board, from: Position, piece: Piece) -> Vec<Move> {
    let mut moves = Vec::new();
    for &dr in piece.row_directions() {
        for dc in COL_DIRECTIONS {
            let (Some(over), Some(to)) = (from.offset(dr, dc), from.offset(2 * dr, 2 * dc)) else {
                continue;
            };
            if board.square(over).is_side(piece.side.opponent()) && board.is_empty(to) {
                moves.push(Move {
                    from,
                    to,
                    captured: vec![over],
                });
            }
        }
    }
    moves
}

/// Returns true if any piece of `side` can capture.
pub(super) fn any_capture(board: &Board, side: Side) -> bool {
    board
        .pieces(side)
        .any(|(pos, piece)| !jumps_from(board, pos, piece).is_empty())
}

/// Returns true if any piece of `side` can move at all.
pub(super) fn any_move(board: &Board, side: Side) -> bool {
    board.pieces(side).any(|(pos, piece)| {
        !steps_from(board, pos, piece).is_empty() || !jumps_from(board, pos, piece).is_empty()
    })
}
