//! Typed HTTP client for the game server's REST API.

use crate::error::ClientError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use strictly_checkers::{
    CreateSessionRequest, ErrorBody, ErrorKind, JoinRequest, Move, MoveCoords, MoveRequest,
    PlayerInfo, PlayerRequest, Session,
};
use tracing::{debug, info, instrument, warn};

/// HTTP client for one game server.
#[derive(Debug, Clone)]
pub struct GameClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl GameClient {
    /// Creates a client for `base_url`. The timeout applies to each request,
    /// not to snapshot streams.
    #[instrument(skip_all, fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>, request_timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            client,
            request_timeout,
        })
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Session, ClientError> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn get(&self, path: &str) -> Result<Session, ClientError> {
        let response = self
            .client
            .get(self.url(path))
            .timeout(self.request_timeout)
            .send()
            .await?;
        decode(response).await
    }

    /// Creates a session with `player` as White.
    #[instrument(skip(self, player), fields(player_id = %player.id))]
    pub async fn create_session(
        &self,
        player: PlayerInfo,
        time_control_secs: Option<u32>,
    ) -> Result<Session, ClientError> {
        info!("Creating session");
        let body = CreateSessionRequest {
            player,
            time_control_secs,
        };
        self.post("/api/sessions", &body).await
    }

    /// Gets the current snapshot of a session.
    #[instrument(skip(self))]
    pub async fn get_session(&self, session_id: &str) -> Result<Session, ClientError> {
        debug!("Getting session via REST");
        self.get(&format!("/api/sessions/{session_id}")).await
    }

    /// Looks a session up by join code.
    #[instrument(skip(self))]
    pub async fn find_by_code(&self, code: &str) -> Result<Session, ClientError> {
        self.get(&format!("/api/sessions/code/{code}")).await
    }

    /// Joins a session as Black.
    #[instrument(skip(self, player), fields(player_id = %player.id))]
    pub async fn join(&self, session_id: &str, player: PlayerInfo) -> Result<Session, ClientError> {
        info!("Joining session");
        self.post(&format!("/api/sessions/{session_id}/join"), &JoinRequest { player })
            .await
    }

    /// Submits a move intent; the reply is the resulting snapshot.
    #[instrument(skip(self), fields(mv = %mv))]
    pub async fn submit_move(
        &self,
        session_id: &str,
        player_id: &str,
        mv: &Move,
    ) -> Result<Session, ClientError> {
        info!("Submitting move");
        let body = MoveRequest {
            player_id: player_id.to_string(),
            coords: MoveCoords::from(mv),
        };
        self.post(&format!("/api/sessions/{session_id}/moves"), &body)
            .await
            .inspect_err(|e| warn!(error = %e, "Move not accepted"))
    }

    /// Resigns the game.
    #[instrument(skip(self))]
    pub async fn resign(&self, session_id: &str, player_id: &str) -> Result<Session, ClientError> {
        let body = PlayerRequest {
            player_id: player_id.to_string(),
        };
        self.post(&format!("/api/sessions/{session_id}/resign"), &body)
            .await
    }

    /// Reports that `player_id` has left.
    #[instrument(skip(self))]
    pub async fn disconnect(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Session, ClientError> {
        let body = PlayerRequest {
            player_id: player_id.to_string(),
        };
        self.post(&format!("/api/sessions/{session_id}/disconnect"), &body)
            .await
    }

    /// Opens the raw snapshot event stream of a session.
    #[instrument(skip(self))]
    pub async fn open_events(&self, session_id: &str) -> Result<reqwest::Response, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/api/sessions/{session_id}/events")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if response.status().is_success() {
            debug!("Event stream opened");
            Ok(response)
        } else {
            Err(error_from(response).await)
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

async fn error_from(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return ClientError::from(e),
    };
    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => ClientError::from(body),
        Err(_) => ClientError::Api {
            kind: kind_for_status(status),
            code: format!("http{}", status.as_u16()),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        },
    }
}

/// Best-effort category for error responses without a JSON body.
fn kind_for_status(status: reqwest::StatusCode) -> ErrorKind {
    match status.as_u16() {
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        400 | 422 => ErrorKind::RuleViolation,
        408 | 504 => ErrorKind::Timeout,
        _ => ErrorKind::TransportFailure,
    }
}
