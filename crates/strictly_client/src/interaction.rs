//! Click handling for one participant.
//!
//! The controller turns cell clicks into move intents. It only pre-filters
//! on geometry; the server is the judge of legality, and any rejection just
//! returns the controller to [`Selection::Idle`].

use crate::error::ClientError;
use derive_getters::Getters;
use strictly_checkers::{Move, PlayerId, Position, Rules, Session, SessionStatus};
use tracing::{debug, info, instrument};

/// Selection state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing selected.
    #[default]
    Idle,
    /// A piece is selected.
    Selected {
        /// Square of the selected piece.
        origin: Position,
        /// Legal destinations for highlighting.
        destinations: Vec<Position>,
    },
    /// A move was sent and no answer has arrived yet.
    MoveSubmitted(Move),
}

/// Result of a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click had no effect.
    Ignored,
    /// A piece was selected.
    Selected(Position),
    /// The selection was cleared.
    Deselected,
    /// The caller should submit this move.
    Submit(Move),
}

/// Selection state machine for one participant.
#[derive(Debug, Clone, Getters)]
pub struct InteractionController {
    /// Participant driving this controller.
    player_id: PlayerId,
    /// Rules used for destination hints.
    rules: Rules,
    /// Current selection.
    selection: Selection,
    /// Message of the last rejected move.
    last_error: Option<String>,
    /// False while the snapshot connection is lost.
    connected: bool,
}

impl InteractionController {
    /// Creates an idle controller for `player_id`.
    pub fn new(player_id: impl Into<PlayerId>, rules: Rules) -> Self {
        Self {
            player_id: player_id.into(),
            rules,
            selection: Selection::Idle,
            last_error: None,
            connected: true,
        }
    }

    /// Returns true if clicks are accepted against `session`.
    pub fn can_act(&self, session: &Session) -> bool {
        self.connected
            && !matches!(self.selection, Selection::MoveSubmitted(_))
            && session.status() == &SessionStatus::InProgress
            && session.side_of(&self.player_id) == Some(*session.side_to_move())
    }

    /// Handles a click on `cell` given the current snapshot.
    #[instrument(skip(self, session), fields(player_id = %self.player_id))]
    pub fn click(&mut self, cell: Position, session: &Session) -> ClickOutcome {
        if !self.can_act(session) {
            debug!("Click ignored");
            return ClickOutcome::Ignored;
        }
        let owned = session
            .board()
            .piece_at(cell)
            .is_some_and(|piece| Some(piece.side) == session.side_of(&self.player_id));

        let selected = match &self.selection {
            Selection::Idle => None,
            Selection::Selected { origin, .. } => Some(*origin),
            Selection::MoveSubmitted(_) => return ClickOutcome::Ignored,
        };

        match selected {
            None if owned => self.select(cell, session),
            None => ClickOutcome::Ignored,
            Some(origin) if origin == cell => {
                self.selection = Selection::Idle;
                ClickOutcome::Deselected
            }
            Some(_) if owned => self.select(cell, session),
            Some(origin) if origin.is_diagonal_to(cell) => {
                let mv = Move::new(origin, cell);
                info!(mv = %mv, "Move intent");
                self.selection = Selection::MoveSubmitted(mv.clone());
                self.last_error = None;
                ClickOutcome::Submit(mv)
            }
            Some(_) => {
                self.selection = Selection::Idle;
                ClickOutcome::Deselected
            }
        }
    }

    fn select(&mut self, origin: Position, session: &Session) -> ClickOutcome {
        let destinations = session.legal_destinations(origin, &self.rules);
        debug!(origin = %origin, count = destinations.len(), "Selected piece");
        self.selection = Selection::Selected {
            origin,
            destinations,
        };
        ClickOutcome::Selected(origin)
    }

    /// A newer snapshot was applied. Selection is derived state, so it is
    /// dropped along with any pending submission.
    pub fn on_snapshot(&mut self, session: &Session) {
        if self.selection != Selection::Idle {
            debug!(revision = session.revision(), "Selection cleared by snapshot");
        }
        self.selection = Selection::Idle;
    }

    /// The submission was rejected; the board is left as the server has it.
    pub fn on_rejected(&mut self, error: &ClientError) {
        debug!(error = %error, "Move rejected");
        self.selection = Selection::Idle;
        self.last_error = Some(error.to_string());
    }

    /// Records the connection state. Losing the connection clears any
    /// selection.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            self.selection = Selection::Idle;
        }
    }
}
