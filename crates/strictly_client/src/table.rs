//! A participant seated at one game.
//!
//! [`Table`] ties the REST client, the snapshot subscription, the local view
//! and the click controller together. It owns no authoritative state: every
//! board it shows came from a server snapshot.

use crate::error::ClientError;
use crate::interaction::{ClickOutcome, InteractionController};
use crate::rest_client::GameClient;
use crate::sync::{ConnectionState, SyncClient, SyncEvent};
use crate::view::LocalView;
use strictly_checkers::{PlayerInfo, Position, Rules, Session, SessionId};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Participant state for one session.
#[derive(Debug)]
pub struct Table {
    client: GameClient,
    sync: SyncClient,
    player: PlayerInfo,
    view: LocalView,
    controller: InteractionController,
    connection: ConnectionState,
    session_id: Option<SessionId>,
    events: Option<mpsc::Receiver<SyncEvent>>,
}

impl Table {
    /// Creates a table for `player`, not yet watching any session.
    pub fn new(client: GameClient, sync: SyncClient, player: PlayerInfo, rules: Rules) -> Self {
        let controller = InteractionController::new(player.id.clone(), rules);
        Self {
            client,
            sync,
            player,
            view: LocalView::new(),
            controller,
            connection: ConnectionState::Disconnected,
            session_id: None,
            events: None,
        }
    }

    /// The seated player.
    pub fn player(&self) -> &PlayerInfo {
        &self.player
    }

    /// Local view of the session.
    pub fn view(&self) -> &LocalView {
        &self.view
    }

    /// Click controller.
    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    /// Current connection state.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Creates a new session seated as White and starts watching it.
    #[instrument(skip(self), fields(player_id = %self.player.id))]
    pub async fn create(&mut self, time_control_secs: Option<u32>) -> Result<Session, ClientError> {
        let session = self
            .client
            .create_session(self.player.clone(), time_control_secs)
            .await?;
        self.watch(session.id());
        self.view.apply(session.clone());
        Ok(session)
    }

    /// Joins the session with join `code` as Black and starts watching it.
    #[instrument(skip(self), fields(player_id = %self.player.id))]
    pub async fn join_by_code(&mut self, code: &str) -> Result<Session, ClientError> {
        let found = self.client.find_by_code(code).await?;
        let session = self.client.join(found.id(), self.player.clone()).await?;
        self.watch(session.id());
        self.view.apply(session.clone());
        Ok(session)
    }

    /// Starts watching `session_id`, replacing any previous subscription.
    pub fn watch(&mut self, session_id: &str) {
        if self.session_id.as_deref() != Some(session_id) {
            self.view.clear();
        }
        info!(session_id, "Watching session");
        self.events = Some(self.sync.subscribe(session_id));
        self.session_id = Some(session_id.to_string());
    }

    /// Stops watching.
    pub fn leave(&mut self) {
        self.sync.unsubscribe();
        self.events = None;
        self.session_id = None;
        self.connection = ConnectionState::Disconnected;
        self.controller.set_connected(false);
    }

    /// Waits for the next subscription event and folds it into local state.
    ///
    /// Returns `None` once the subscription has finished.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        let event = self.events.as_mut()?.recv().await;
        match &event {
            Some(event) => self.handle(event),
            None => self.events = None,
        }
        event
    }

    fn handle(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Snapshot(snapshot) => {
                if self.view.apply(snapshot.as_ref().clone()) {
                    self.controller.on_snapshot(snapshot);
                }
            }
            SyncEvent::Connection(state) => {
                debug!(?state, "Connection state changed");
                self.connection = *state;
                self.controller
                    .set_connected(*state == ConnectionState::Connected);
            }
            SyncEvent::Ended => info!("Session ended"),
        }
    }

    /// Handles a click on `cell`. A resulting move is submitted and the
    /// reply snapshot applied; a rejection is surfaced through the
    /// controller's last error and leaves the view untouched.
    #[instrument(skip(self), fields(player_id = %self.player.id))]
    pub async fn click(&mut self, cell: Position) -> Result<ClickOutcome, ClientError> {
        let Some(snapshot) = self.view.snapshot() else {
            return Ok(ClickOutcome::Ignored);
        };
        let outcome = self.controller.click(cell, snapshot);
        let ClickOutcome::Submit(mv) = &outcome else {
            return Ok(outcome);
        };
        let session_id = snapshot.id().clone();

        match self.client.submit_move(&session_id, &self.player.id, mv).await {
            Ok(session) => {
                if self.view.apply(session.clone()) {
                    self.controller.on_snapshot(&session);
                }
                Ok(outcome)
            }
            Err(e) => {
                self.controller.on_rejected(&e);
                if e.kind().is_locally_recoverable() {
                    Ok(outcome)
                } else {
                    warn!(error = %e, "Move submission failed");
                    Err(e)
                }
            }
        }
    }

    /// Resigns the watched session.
    #[instrument(skip(self), fields(player_id = %self.player.id))]
    pub async fn resign(&mut self) -> Result<Session, ClientError> {
        let session_id = self.watched()?;
        let session = self.client.resign(&session_id, &self.player.id).await?;
        self.view.apply(session.clone());
        Ok(session)
    }

    /// Reports leaving the watched session and stops watching.
    #[instrument(skip(self), fields(player_id = %self.player.id))]
    pub async fn disconnect(&mut self) -> Result<Session, ClientError> {
        let session_id = self.watched()?;
        let session = self.client.disconnect(&session_id, &self.player.id).await?;
        self.view.apply(session.clone());
        self.leave();
        Ok(session)
    }

    fn watched(&self) -> Result<SessionId, ClientError> {
        self.session_id.clone().ok_or_else(|| ClientError::Api {
            kind: strictly_checkers::ErrorKind::NotFound,
            code: "notWatching".to_string(),
            message: "Not watching any session".to_string(),
        })
    }
}
