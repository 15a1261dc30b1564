//! Game session state machine.
//!
//! A [`Session`] owns the board, the side to move and the clocks. It is the
//! unit of replication: every accepted mutation bumps [`Session::revision`]
//! and the whole value is what subscribers receive.

use crate::action::{Move, MoveCoords, MoveRecord};
use crate::board::{Board, BoardError};
use crate::clock::GameClock;
use crate::error::ErrorKind;
use crate::position::Position;
use crate::rules::{MoveRejection, Rules, Terminal};
use crate::types::Side;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Unique identifier for a player.
pub type PlayerId = String;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SessionStatus {
    /// Created, waiting for an opponent.
    Waiting,
    /// Both seats filled, moves accepted.
    InProgress,
    /// Ended by rule, resignation or timeout.
    Finished,
    /// Ended by a participant disconnecting.
    Abandoned,
}

impl SessionStatus {
    /// Returns true for Finished and Abandoned.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Abandoned)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FinishReason {
    /// The loser had no legal move.
    NoLegalMoves,
    /// The loser resigned.
    Resignation,
    /// The loser's clock ran out.
    Timeout,
    /// The loser disconnected.
    Disconnect,
}

/// A participant as identified by the external session issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Player's unique ID.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
}

impl PlayerInfo {
    /// Creates player info.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Failures of session operations.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error, From)]
pub enum SessionError {
    /// No session with that id or code.
    #[display("Session {_0} not found")]
    SessionNotFound(#[error(not(source))] String),
    /// Both seats are taken.
    #[display("Session already has two players")]
    SessionFull,
    /// The player already holds a seat in this session.
    #[display("You are already in this game")]
    AlreadyJoined,
    /// The session does not accept this operation in its current state.
    #[display("Session is not active")]
    SessionNotActive,
    /// The player holds no seat in this session.
    #[display("Player is not part of this session")]
    NotAParticipant,
    /// The other side is to move.
    #[display("Not your turn")]
    NotYourTurn,
    /// Move coordinates are off the board.
    #[display("Invalid coordinates: {_0}")]
    #[from]
    InvalidCoordinates(BoardError),
    /// The rule engine refused the move.
    #[display("{_0}")]
    #[from]
    Rule(MoveRejection),
}

impl SessionError {
    /// Category used for status mapping and client recovery.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SessionNotFound(_) => ErrorKind::NotFound,
            SessionError::SessionFull
            | SessionError::AlreadyJoined
            | SessionError::NotAParticipant
            | SessionError::NotYourTurn => ErrorKind::Conflict,
            SessionError::SessionNotActive => ErrorKind::NotActive,
            SessionError::InvalidCoordinates(_) => ErrorKind::RuleViolation,
            SessionError::Rule(rejection) => rejection.kind(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::SessionNotFound(_) => "sessionNotFound",
            SessionError::SessionFull => "sessionFull",
            SessionError::AlreadyJoined => "alreadyJoined",
            SessionError::SessionNotActive => "sessionNotActive",
            SessionError::NotAParticipant => "notAParticipant",
            SessionError::NotYourTurn => "notYourTurn",
            SessionError::InvalidCoordinates(_) => "invalidCoordinates",
            SessionError::Rule(rejection) => rejection.code(),
        }
    }
}

/// Authoritative state of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID.
    id: SessionId,
    /// Short code players share to join.
    code: String,
    /// Current board.
    board: Board,
    /// Side to move.
    side_to_move: Side,
    /// Lifecycle state.
    status: SessionStatus,
    /// Player on the White side (the creator).
    white: Option<PlayerInfo>,
    /// Player on the Black side.
    black: Option<PlayerInfo>,
    /// Winning side once the session has ended.
    winner: Option<Side>,
    /// Why the session ended.
    finish_reason: Option<FinishReason>,
    /// Per-side clocks.
    clock: GameClock,
    /// Accepted moves in order.
    history: Vec<MoveRecord>,
    /// Square of a piece that must continue capturing.
    pending_capture: Option<Position>,
    /// Bumped on every broadcast mutation.
    revision: u64,
    /// Creation time.
    created_at: DateTime<Utc>,
    /// When the second player joined.
    started_at: Option<DateTime<Utc>>,
    /// When the session ended.
    finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session in Waiting with the standard board and `creator`
    /// seated as White.
    #[instrument(skip(creator), fields(player_id = %creator.id))]
    pub fn new(
        id: SessionId,
        code: String,
        creator: PlayerInfo,
        time_control_secs: Option<u32>,
    ) -> Self {
        info!(session_id = %id, code = %code, "Creating game session");
        Self {
            id,
            code,
            board: Board::standard(),
            side_to_move: Side::White,
            status: SessionStatus::Waiting,
            white: Some(creator),
            black: None,
            winner: None,
            finish_reason: None,
            clock: GameClock::new(time_control_secs),
            history: Vec::new(),
            pending_capture: None,
            revision: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Replaces the starting position of a session that has not started.
    pub fn with_board(mut self, board: Board, side_to_move: Side) -> Self {
        if self.status == SessionStatus::Waiting {
            self.board = board;
            self.side_to_move = side_to_move;
        }
        self
    }

    /// Side held by `player_id`, if seated.
    pub fn side_of(&self, player_id: &str) -> Option<Side> {
        if self.white.as_ref().is_some_and(|p| p.id == player_id) {
            Some(Side::White)
        } else if self.black.as_ref().is_some_and(|p| p.id == player_id) {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// Player seated on `side`.
    pub fn player(&self, side: Side) -> Option<&PlayerInfo> {
        match side {
            Side::White => self.white.as_ref(),
            Side::Black => self.black.as_ref(),
        }
    }

    /// The winning player, once decided.
    pub fn winner_player(&self) -> Option<&PlayerInfo> {
        self.winner.and_then(|side| self.player(side))
    }

    /// Seats `player` as Black and starts the game.
    #[instrument(skip(self, player), fields(session_id = %self.id, player_id = %player.id))]
    pub fn join(&mut self, player: PlayerInfo) -> Result<(), SessionError> {
        if self.side_of(&player.id).is_some() {
            warn!("Player tried to join own session");
            return Err(SessionError::AlreadyJoined);
        }
        if self.black.is_some() {
            warn!("Session already has two players");
            return Err(SessionError::SessionFull);
        }
        if self.status != SessionStatus::Waiting {
            return Err(SessionError::SessionNotActive);
        }

        self.black = Some(player);
        self.status = SessionStatus::InProgress;
        self.started_at = Some(Utc::now());
        self.clock.start(self.side_to_move);
        self.revision += 1;
        info!(revision = self.revision, "Session started");
        Ok(())
    }

    /// Checks that the session is in progress and `player_id` is the side to
    /// move, returning that side.
    pub fn ensure_turn(&self, player_id: &str) -> Result<Side, SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionError::SessionNotActive);
        }
        let side = self.side_of(player_id).ok_or(SessionError::NotAParticipant)?;
        if side != self.side_to_move {
            warn!(side = %side, to_move = %self.side_to_move, "Move out of turn");
            return Err(SessionError::NotYourTurn);
        }
        Ok(side)
    }

    /// Like [`Session::submit_move`], but takes raw wire coordinates. Turn
    /// checks run before the coordinates are validated.
    pub fn submit_coords(
        &mut self,
        player_id: &str,
        coords: MoveCoords,
        rules: &Rules,
    ) -> Result<(), SessionError> {
        self.ensure_turn(player_id)?;
        let mv = coords.to_move()?;
        self.submit_move(player_id, mv, rules)
    }

    /// Validates and applies a move for `player_id`.
    #[instrument(skip(self, rules), fields(session_id = %self.id, mv = %mv))]
    pub fn submit_move(
        &mut self,
        player_id: &str,
        mv: Move,
        rules: &Rules,
    ) -> Result<(), SessionError> {
        let side = self.ensure_turn(player_id)?;

        let applied = rules
            .evaluate_chain(&self.board, side, &mv, self.pending_capture)
            .inspect_err(|rejection| warn!(%rejection, "Move rejected"))?;

        self.board = applied.board;
        self.history.push(MoveRecord {
            side,
            mv: applied.mv,
            promoted: applied.promoted,
        });

        if let Some(Terminal::NoLegalMoves { loser }) = applied.terminal {
            self.pending_capture = None;
            self.finish(loser.opponent(), FinishReason::NoLegalMoves);
        } else if applied.continuation_required {
            self.pending_capture = Some(mv.to);
            debug!(square = %mv.to, "Capture must continue");
        } else {
            self.pending_capture = None;
            self.side_to_move = side.opponent();
            self.clock.switch_to(self.side_to_move);
        }

        self.revision += 1;
        info!(
            revision = self.revision,
            side_to_move = %self.side_to_move,
            status = %self.status,
            "Move applied"
        );
        Ok(())
    }

    /// Ends the session with the opponent of `player_id` as winner.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn resign(&mut self, player_id: &str) -> Result<(), SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionError::SessionNotActive);
        }
        let side = self.side_of(player_id).ok_or(SessionError::NotAParticipant)?;
        self.finish(side.opponent(), FinishReason::Resignation);
        self.revision += 1;
        info!(loser = %side, "Player resigned");
        Ok(())
    }

    /// Marks the session Abandoned after `player_id` disconnected. The
    /// remaining player wins.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn abandon(&mut self, player_id: &str) -> Result<(), SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionError::SessionNotActive);
        }
        let side = self.side_of(player_id).ok_or(SessionError::NotAParticipant)?;
        self.finish(side.opponent(), FinishReason::Disconnect);
        self.status = SessionStatus::Abandoned;
        self.revision += 1;
        info!(disconnected = %side, "Session abandoned");
        Ok(())
    }

    /// Charges `secs` to the running clock. Returns the side that timed
    /// out, in which case the session is now Finished.
    pub fn tick_clock(&mut self, secs: u32) -> Option<Side> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        let loser = self.clock.tick(secs)?;
        self.finish(loser.opponent(), FinishReason::Timeout);
        self.revision += 1;
        info!(session_id = %self.id, loser = %loser, "Clock ran out");
        Some(loser)
    }

    /// Legal destinations for the piece on `from`, for the side to move.
    pub fn legal_destinations(&self, from: Position, rules: &Rules) -> Vec<Position> {
        if self.status != SessionStatus::InProgress {
            return Vec::new();
        }
        rules.legal_destinations(&self.board, self.side_to_move, from, self.pending_capture)
    }

    fn finish(&mut self, winner: Side, reason: FinishReason) {
        self.status = SessionStatus::Finished;
        self.winner = Some(winner);
        self.finish_reason = Some(reason);
        self.finished_at = Some(Utc::now());
        self.clock.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(time_control: Option<u32>) -> Session {
        let mut session = Session::new(
            "s1".into(),
            "ABCD1234".into(),
            PlayerInfo::new("alice", "Alice"),
            time_control,
        );
        session.join(PlayerInfo::new("bob", "Bob")).unwrap();
        session
    }

    fn mv(r1: u8, c1: u8, r2: u8, c2: u8) -> Move {
        Move::from_coords(r1, c1, r2, c2).unwrap()
    }

    #[test]
    fn creator_is_white_and_join_starts_game() {
        let session = started(Some(600));
        assert_eq!(session.side_of("alice"), Some(Side::White));
        assert_eq!(session.side_of("bob"), Some(Side::Black));
        assert_eq!(*session.status(), SessionStatus::InProgress);
        assert_eq!(session.clock().running(), Some(Side::White));
        assert_eq!(*session.revision(), 1);
    }

    #[test]
    fn joining_twice_is_rejected() {
        let mut session = started(None);
        assert_eq!(
            session.join(PlayerInfo::new("carol", "Carol")),
            Err(SessionError::SessionFull)
        );
        assert_eq!(
            session.join(PlayerInfo::new("alice", "Alice")),
            Err(SessionError::AlreadyJoined)
        );
    }

    #[test]
    fn wrong_side_move_leaves_session_unchanged() {
        let mut session = started(None);
        let before = session.clone();
        assert_eq!(
            session.submit_move("bob", mv(5, 0, 4, 1), &Rules::default()),
            Err(SessionError::NotYourTurn)
        );
        assert_eq!(session, before);
    }

    #[test]
    fn accepted_move_flips_side_and_clock() {
        let mut session = started(Some(600));
        session
            .submit_move("alice", mv(2, 1, 3, 2), &Rules::default())
            .unwrap();
        assert_eq!(*session.side_to_move(), Side::Black);
        assert_eq!(session.clock().running(), Some(Side::Black));
        assert_eq!(session.history().len(), 1);
        assert_eq!(*session.revision(), 2);
    }

    #[test]
    fn outsider_cannot_move() {
        let mut session = started(None);
        assert_eq!(
            session.submit_move("mallory", mv(2, 1, 3, 2), &Rules::default()),
            Err(SessionError::NotAParticipant)
        );
    }

    #[test]
    fn abandon_awards_remaining_player() {
        let mut session = started(None);
        session.abandon("bob").unwrap();
        assert_eq!(*session.status(), SessionStatus::Abandoned);
        assert_eq!(session.winner_player().map(|p| p.id.as_str()), Some("alice"));
        assert_eq!(*session.finish_reason(), Some(FinishReason::Disconnect));
    }

    #[test]
    fn errors_map_to_kinds() {
        assert_eq!(SessionError::NotYourTurn.kind(), ErrorKind::Conflict);
        assert_eq!(SessionError::SessionNotActive.kind(), ErrorKind::NotActive);
        assert_eq!(
            SessionError::Rule(MoveRejection::MustCapture).kind(),
            ErrorKind::RuleViolation
        );
        assert_eq!(
            SessionError::SessionNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
    }
}
