//! Local copy of the authoritative session.

use strictly_checkers::{Clock, Move, Rules, Session, SessionStatus, Side};
use tokio::time::Instant;
use tracing::{debug, trace};

/// The participant's view of one session.
///
/// Snapshots replace the held state wholesale. A snapshot whose revision is
/// not greater than the held one is discarded, so replays are harmless.
#[derive(Debug, Clone, Default)]
pub struct LocalView {
    snapshot: Option<Session>,
    received_at: Option<Instant>,
}

impl LocalView {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if any has arrived.
    pub fn snapshot(&self) -> Option<&Session> {
        self.snapshot.as_ref()
    }

    /// Applies `snapshot`. Returns true if it replaced the held state.
    pub fn apply(&mut self, snapshot: Session) -> bool {
        if let Some(held) = &self.snapshot {
            if held.id() == snapshot.id() && snapshot.revision() <= held.revision() {
                trace!(
                    held = held.revision(),
                    received = snapshot.revision(),
                    "Discarding stale snapshot"
                );
                return false;
            }
        }
        debug!(
            session_id = %snapshot.id(),
            revision = snapshot.revision(),
            "Applied snapshot"
        );
        self.snapshot = Some(snapshot);
        self.received_at = Some(Instant::now());
        true
    }

    /// Forgets the held session.
    pub fn clear(&mut self) {
        self.snapshot = None;
        self.received_at = None;
    }

    /// Remaining time for `side` as the participant should see it now.
    ///
    /// The server only broadcasts clock state on moves and on expiry, so the
    /// running side's time is counted down locally from the snapshot.
    pub fn clock_display(&self, side: Side) -> Clock {
        let Some(snapshot) = &self.snapshot else {
            return Clock::Unbounded;
        };
        let clock = snapshot.clock();
        match clock.remaining(side) {
            Clock::Remaining(left) if clock.running() == Some(side) => {
                let elapsed = self
                    .received_at
                    .map(|at| at.elapsed().as_secs())
                    .unwrap_or_default();
                let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
                Clock::Remaining(left.saturating_sub(elapsed))
            }
            other => other,
        }
    }

    /// Moves available to the side to move under `rules`. Empty unless the
    /// held session is in progress.
    pub fn legal_moves(&self, rules: &Rules) -> Vec<Move> {
        match &self.snapshot {
            Some(snapshot) if snapshot.status() == &SessionStatus::InProgress => rules.legal_moves(
                snapshot.board(),
                *snapshot.side_to_move(),
                *snapshot.pending_capture(),
            ),
            _ => Vec::new(),
        }
    }

    /// Multi-line text rendering: board, players, clocks and status.
    pub fn render(&self) -> String {
        let Some(snapshot) = &self.snapshot else {
            return "No session".to_string();
        };
        let mut out = snapshot.board().display();
        for side in [Side::White, Side::Black] {
            let name = snapshot
                .player(side)
                .map_or("(waiting)", |p| p.name.as_str());
            let marker = if snapshot.status() == &SessionStatus::InProgress
                && *snapshot.side_to_move() == side
            {
                " *"
            } else {
                ""
            };
            out.push_str(&format!(
                "{side}: {name} [{}]{marker}\n",
                format_clock(self.clock_display(side))
            ));
        }
        let status = match (snapshot.status(), snapshot.winner_player()) {
            (SessionStatus::Waiting, _) => format!("Waiting for opponent, code {}", snapshot.code()),
            (SessionStatus::InProgress, _) => format!("{} to move", snapshot.side_to_move()),
            (status, Some(winner)) => format!(
                "{status}: {} wins ({})",
                winner.name,
                snapshot
                    .finish_reason()
                    .map_or_else(String::new, |r| r.to_string())
            ),
            (status, None) => status.to_string(),
        };
        out.push_str(&status);
        out.push('\n');
        out
    }
}

/// `m:ss`, or `--` without a time control.
pub fn format_clock(clock: Clock) -> String {
    match clock {
        Clock::Unbounded => "--".to_string(),
        Clock::Remaining(secs) => format!("{}:{:02}", secs / 60, secs % 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strictly_checkers::{MoveCoords, PlayerInfo, Rules};

    fn started(time_control: Option<u32>) -> Session {
        let mut session = Session::new(
            "s1".into(),
            "ABCD1234".into(),
            PlayerInfo::new("a", "Alice"),
            time_control,
        );
        session.join(PlayerInfo::new("b", "Bob")).unwrap();
        session
    }

    #[test]
    fn same_snapshot_twice_changes_nothing() {
        let mut view = LocalView::new();
        let snapshot = started(None);
        assert!(view.apply(snapshot.clone()));
        assert!(!view.apply(snapshot.clone()));
        assert_eq!(view.snapshot(), Some(&snapshot));
    }

    #[test]
    fn older_revision_is_discarded() {
        let mut view = LocalView::new();
        let old = started(None);
        let mut newer = old.clone();
        newer
            .submit_coords(
                "a",
                MoveCoords {
                    origin_row: 2,
                    origin_col: 1,
                    dest_row: 3,
                    dest_col: 0,
                },
                &Rules::default(),
            )
            .unwrap();

        assert!(view.apply(newer.clone()));
        assert!(!view.apply(old));
        assert_eq!(view.snapshot(), Some(&newer));
    }

    #[test]
    fn another_session_replaces_regardless_of_revision() {
        let mut view = LocalView::new();
        view.apply(started(None));
        let other = Session::new("s2".into(), "ZZZZ0000".into(), PlayerInfo::new("c", "Cy"), None);
        assert!(view.apply(other));
        assert_eq!(view.snapshot().map(|s| s.id().as_str()), Some("s2"));
    }

    #[test]
    fn legal_moves_follow_the_held_snapshot() {
        let mut view = LocalView::new();
        assert!(view.legal_moves(&Rules::default()).is_empty());

        view.apply(Session::new(
            "s1".into(),
            "ABCD1234".into(),
            PlayerInfo::new("a", "Alice"),
            None,
        ));
        assert!(view.legal_moves(&Rules::default()).is_empty());

        view.apply(started(None));
        let moves = view.legal_moves(&Rules::default());
        assert_eq!(moves.len(), 7);
        let opening = Move::from_coords(2, 1, 3, 0).unwrap();
        assert!(moves.contains(&opening));
    }

    #[tokio::test(start_paused = true)]
    async fn running_clock_counts_down_locally() {
        let mut view = LocalView::new();
        view.apply(started(Some(600)));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(view.clock_display(Side::White), Clock::Remaining(595));
        assert_eq!(view.clock_display(Side::Black), Clock::Remaining(600));
    }

    #[test]
    fn render_shows_turn_and_clock() {
        let mut view = LocalView::new();
        view.apply(started(Some(90)));
        let text = view.render();
        assert!(text.contains("Alice [1:30] *"));
        assert!(text.contains("Bob [1:30]"));
        assert!(text.contains("to move"));
        assert_eq!(format_clock(Clock::Unbounded), "--");
    }
}
