//! JSON bodies exchanged between server and clients.

use crate::action::MoveCoords;
use crate::error::ErrorKind;
use crate::session::{PlayerId, PlayerInfo, SessionError};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Creator, seated as White.
    pub player: PlayerInfo,
    /// Seconds per side; absent for the server default, 0 for no clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_control_secs: Option<u32>,
}

/// Body of `POST /api/sessions/{id}/join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Joining player, seated as Black.
    pub player: PlayerInfo,
}

/// Body of `POST /api/sessions/{id}/moves`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Moving player.
    pub player_id: PlayerId,
    /// Origin and destination.
    #[serde(flatten)]
    pub coords: MoveCoords,
}

/// Body of the resign and disconnect endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    /// Acting player.
    pub player_id: PlayerId,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Failure category.
    pub kind: ErrorKind,
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&SessionError> for ErrorBody {
    fn from(err: &SessionError) -> Self {
        Self {
            kind: err.kind(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
