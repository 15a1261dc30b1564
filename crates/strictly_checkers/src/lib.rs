//! Strictly Checkers - checkers game logic
//!
//! Pure, synchronous game state for two-player checkers: the board model,
//! the rule engine, per-side clocks and the session state machine whose
//! snapshots the server broadcasts and clients render.
//!
//! # Example
//!
//! ```
//! use strictly_checkers::{Move, PlayerInfo, Rules, Session, Side};
//!
//! let mut session = Session::new(
//!     "s1".to_string(),
//!     "ABCD1234".to_string(),
//!     PlayerInfo::new("alice", "Alice"),
//!     Some(600),
//! );
//! session.join(PlayerInfo::new("bob", "Bob")).unwrap();
//!
//! let mv = Move::from_coords(2, 1, 3, 2).unwrap();
//! session.submit_move("alice", mv, &Rules::default()).unwrap();
//! assert_eq!(*session.side_to_move(), Side::Black);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod board;
mod clock;
mod error;
mod position;
mod rules;
mod session;
mod types;
mod wire;

pub use action::{Move, MoveCoords, MoveRecord};
pub use board::{BOARD_SIZE, Board, BoardError};
pub use clock::{Clock, GameClock};
pub use error::ErrorKind;
pub use position::Position;
pub use rules::{AppliedMove, CapturePolicy, MoveRejection, Rules, Terminal};
pub use session::{FinishReason, PlayerId, PlayerInfo, Session, SessionError, SessionId, SessionStatus};
pub use types::{Piece, Rank, Side, Square};
pub use wire::{CreateSessionRequest, ErrorBody, JoinRequest, MoveRequest, PlayerRequest};
