//! Rule engine.
//!
//! [`Rules::evaluate`] decides legality of a move for the side to move and
//! computes its effect: the resulting board, promotion, whether the same
//! piece must keep capturing, and whether the opponent has been left without
//! a legal move.

mod movegen;

use crate::action::Move;
use crate::board::Board;
use crate::error::ErrorKind;
use crate::position::Position;
use crate::types::{Piece, Side, Square};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Whether a capture must be taken when one is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CapturePolicy {
    /// A simple move is illegal while any capture is available.
    #[default]
    Mandatory,
    /// Captures are optional.
    Optional,
}

/// Reasons the rule engine refuses a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveRejection {
    /// Origin does not hold a piece of the side to move.
    #[display("Origin does not hold one of your pieces")]
    NotYourPiece,
    /// Destination is occupied or not a playable square.
    #[display("Destination is occupied or not playable")]
    IllegalDestination,
    /// Not a forward diagonal step or a jump over an enemy piece.
    #[display("Move is not a legal diagonal step or jump")]
    IllegalGeometry,
    /// A capture is available, so a simple move is not allowed.
    #[display("A capture is available and must be taken")]
    MustCapture,
    /// The piece that just captured must continue capturing.
    #[display("The capturing piece must continue its jump")]
    MustContinueCapture,
}

impl MoveRejection {
    /// Error category of every rejection.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::RuleViolation
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            MoveRejection::NotYourPiece => "notYourPiece",
            MoveRejection::IllegalDestination => "illegalDestination",
            MoveRejection::IllegalGeometry => "illegalGeometry",
            MoveRejection::MustCapture => "mustCapture",
            MoveRejection::MustContinueCapture => "mustContinueCapture",
        }
    }
}

/// Terminal condition detected after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Terminal {
    /// The given side has no legal move and loses.
    NoLegalMoves {
        /// Side left without a move.
        loser: Side,
    },
}

/// Result of a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Board after the move.
    pub board: Board,
    /// The move with its captures filled in.
    pub mv: Move,
    /// Whether the moving man became a king.
    pub promoted: bool,
    /// The same piece must capture again before the turn passes.
    pub continuation_required: bool,
    /// Set when the move ends the game.
    pub terminal: Option<Terminal>,
}

/// The rule set in force for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rules {
    capture_policy: CapturePolicy,
}

impl Rules {
    /// Creates a rule set with the given capture policy.
    pub fn new(capture_policy: CapturePolicy) -> Self {
        Self { capture_policy }
    }

    /// Returns the capture policy.
    pub fn capture_policy(&self) -> CapturePolicy {
        self.capture_policy
    }

    /// Evaluates a move for `side` with no capture chain in progress.
    pub fn evaluate(
        &self,
        board: &Board,
        side: Side,
        mv: &Move,
    ) -> Result<AppliedMove, MoveRejection> {
        self.evaluate_chain(board, side, mv, None)
    }

    /// Evaluates a move for `side`. When `pending` is set, only a further
    /// capture by the piece on that square is legal.
    #[instrument(skip(self, board), fields(side = %side, mv = %mv))]
    pub fn evaluate_chain(
        &self,
        board: &Board,
        side: Side,
        mv: &Move,
        pending: Option<Position>,
    ) -> Result<AppliedMove, MoveRejection> {
        let piece = match board.square(mv.from) {
            Square::Occupied(piece) if piece.side == side => piece,
            _ => return Err(MoveRejection::NotYourPiece),
        };

        if !mv.to.is_playable() || !board.is_empty(mv.to) {
            return Err(MoveRejection::IllegalDestination);
        }

        let jumped = Self::geometry(board, mv, piece)?;

        if let Some(chain) = pending
            && (chain != mv.from || jumped.is_none())
        {
            return Err(MoveRejection::MustContinueCapture);
        }

        if jumped.is_none()
            && self.capture_policy == CapturePolicy::Mandatory
            && movegen::any_capture(board, side)
        {
            return Err(MoveRejection::MustCapture);
        }

        if !mv.captured.is_empty() && mv.captured.as_slice() != jumped.as_slice() {
            return Err(MoveRejection::IllegalGeometry);
        }

        let mut next = board.clone();
        next.remove(mv.from);
        if let Some(over) = jumped {
            next.remove(over);
        }
        let promoted = !piece.is_king() && mv.to.row() == side.promotion_row();
        let landed = if promoted { piece.promoted() } else { piece };
        // Destination was checked playable above.
        next.place(mv.to, landed)
            .map_err(|_| MoveRejection::IllegalDestination)?;

        let continuation_required = jumped.is_some()
            && !promoted
            && !movegen::jumps_from(&next, mv.to, landed).is_empty();

        let terminal = if !continuation_required && !movegen::any_move(&next, side.opponent()) {
            Some(Terminal::NoLegalMoves {
                loser: side.opponent(),
            })
        } else {
            None
        };

        debug!(
            captured = jumped.is_some(),
            promoted, continuation_required, terminal = ?terminal,
            "Move accepted"
        );

        Ok(AppliedMove {
            board: next,
            mv: Move {
                from: mv.from,
                to: mv.to,
                captured: jumped.into_iter().collect(),
            },
            promoted,
            continuation_required,
            terminal,
        })
    }

    /// Checks step/jump geometry and returns the jumped square, if any.
    fn geometry(board: &Board, mv: &Move, piece: Piece) -> Result<Option<Position>, MoveRejection> {
        let (dr, dc) = mv.from.delta(mv.to);
        if dr.abs() != dc.abs() || !piece.row_directions().contains(&dr.signum()) {
            return Err(MoveRejection::IllegalGeometry);
        }
        match dr.abs() {
            1 => Ok(None),
            2 => {
                let over = mv
                    .from
                    .offset(dr / 2, dc / 2)
                    .ok_or(MoveRejection::IllegalGeometry)?;
                if board.square(over).is_side(piece.side.opponent()) {
                    Ok(Some(over))
                } else {
                    Err(MoveRejection::IllegalGeometry)
                }
            }
            _ => Err(MoveRejection::IllegalGeometry),
        }
    }

    /// All legal moves for `side`, honoring the capture policy and any
    /// pending capture chain.
    #[instrument(skip(self, board), fields(side = %side))]
    pub fn legal_moves(&self, board: &Board, side: Side, pending: Option<Position>) -> Vec<Move> {
        if let Some(chain) = pending {
            return match board.piece_at(chain) {
                Some(piece) if piece.side == side => movegen::jumps_from(board, chain, piece),
                _ => Vec::new(),
            };
        }

        let jumps: Vec<Move> = board
            .pieces(side)
            .flat_map(|(pos, piece)| movegen::jumps_from(board, pos, piece))
            .collect();
        if !jumps.is_empty() && self.capture_policy == CapturePolicy::Mandatory {
            return jumps;
        }

        let mut moves: Vec<Move> = board
            .pieces(side)
            .flat_map(|(pos, piece)| movegen::steps_from(board, pos, piece))
            .collect();
        moves.extend(jumps);
        moves
    }

    /// Legal destinations for the piece on `from`.
    pub fn legal_destinations(
        &self,
        board: &Board,
        side: Side,
        from: Position,
        pending: Option<Position>,
    ) -> Vec<Position> {
        self.legal_moves(board, side, pending)
            .into_iter()
            .filter(|mv| mv.from == from)
            .map(|mv| mv.to)
            .collect()
    }

    /// Returns true if `side` has at least one legal move.
    pub fn has_legal_move(&self, board: &Board, side: Side) -> bool {
        movegen::any_move(board, side)
    }
}
