//! Per-side game clocks.

use crate::types::Side;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Remaining time for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clock {
    /// No time control.
    Unbounded,
    /// Whole seconds left.
    Remaining(u32),
}

impl Clock {
    /// Seconds left, or `None` when unbounded.
    pub fn seconds(&self) -> Option<u32> {
        match self {
            Clock::Unbounded => None,
            Clock::Remaining(secs) => Some(*secs),
        }
    }

    /// Returns true once a bounded clock has run out.
    pub fn is_expired(&self) -> bool {
        matches!(self, Clock::Remaining(0))
    }
}

/// Both sides' clocks plus which one is running.
///
/// Only the owning session mutates this; the server ticker drives
/// [`GameClock::tick`] and clients derive their countdown from snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameClock {
    white: Clock,
    black: Clock,
    running: Option<Side>,
}

impl GameClock {
    /// Creates stopped clocks. `None` means no time control.
    pub fn new(time_control_secs: Option<u32>) -> Self {
        let clock = time_control_secs.map_or(Clock::Unbounded, Clock::Remaining);
        Self {
            white: clock,
            black: clock,
            running: None,
        }
    }

    /// Returns true when the game has a time control.
    pub fn enabled(&self) -> bool {
        self.white != Clock::Unbounded
    }

    /// Remaining time for a side.
    pub fn remaining(&self, side: Side) -> Clock {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    /// Side whose clock is running.
    pub fn running(&self) -> Option<Side> {
        self.running
    }

    /// Starts the clock of `side`.
    pub fn start(&mut self, side: Side) {
        if self.enabled() {
            self.running = Some(side);
        }
    }

    /// Stops whichever clock is running.
    pub fn stop(&mut self) {
        self.running = None;
    }

    /// Stops the current clock and starts the clock of `side`.
    pub fn switch_to(&mut self, side: Side) {
        self.stop();
        self.start(side);
    }

    /// Charges `secs` to the running side. Returns that side if its clock
    /// reached zero, after which the clock is stopped.
    pub fn tick(&mut self, secs: u32) -> Option<Side> {
        let side = self.running?;
        let clock = match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        };
        let Clock::Remaining(left) = clock else {
            return None;
        };
        *left = left.saturating_sub(secs);
        if *left == 0 {
            debug!(side = %side, "Clock expired");
            self.running = None;
            return Some(side);
        }
        None
    }
}
