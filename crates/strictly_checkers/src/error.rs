//! Error taxonomy shared by server and client.

use serde::{Deserialize, Serialize};

/// Broad category of a failure, used for status mapping and recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorKind {
    /// Unknown session or player.
    NotFound,
    /// Session full, not your turn, not a participant.
    Conflict,
    /// The rule engine refused the move.
    RuleViolation,
    /// Session is not in a state that accepts the operation.
    NotActive,
    /// A request ran out of time.
    Timeout,
    /// The transport to the server failed.
    TransportFailure,
}

impl ErrorKind {
    /// Errors the interaction controller recovers from by reverting its selection.
    pub fn is_locally_recoverable(self) -> bool {
        matches!(self, ErrorKind::RuleViolation | ErrorKind::Conflict)
    }
}
