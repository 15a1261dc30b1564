//! Registry of live game sessions.
//!
//! Each session lives in its own [`SessionSlot`]: a mutex around the
//! authoritative [`Session`], the snapshot hub its subscribers listen on,
//! and the handle of its clock ticker. Every mutation publishes while the
//! slot's lock is held, which gives subscribers one total order per session.

use crate::config::ServerConfig;
use crate::hub::SnapshotHub;
use crate::ticker;
use chrono::{DateTime, Utc};
use derive_new::new;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use strictly_checkers::{
    MoveCoords, PlayerInfo, Rules, Session, SessionError, SessionId, SessionStatus,
};
use tokio::runtime::Handle;
use tokio::sync::{Notify, broadcast};
use tokio::task::AbortHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, instrument, warn};

/// State for one session.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    code: String,
    session: Mutex<Session>,
    hub: SnapshotHub,
    ticker: Mutex<Option<AbortHandle>>,
    turn_changed: Arc<Notify>,
}

impl SessionSlot {
    fn new(session: Session, capacity: usize) -> Self {
        Self {
            code: session.code().clone(),
            session: Mutex::new(session),
            hub: SnapshotHub::new(capacity),
            ticker: Mutex::new(None),
            turn_changed: Arc::new(Notify::new()),
        }
    }

    /// Signalled whenever the running clock changes hands.
    pub(crate) fn turn_changed(&self) -> Arc<Notify> {
        Arc::clone(&self.turn_changed)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current snapshot.
    pub(crate) fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    /// Runs `op` against the session; on success publishes the new snapshot
    /// before releasing the lock and stops the ticker if the game ended.
    fn mutate<F>(&self, op: F) -> Result<Session, SessionError>
    where
        F: FnOnce(&mut Session) -> Result<(), SessionError>,
    {
        let mut session = self.lock();
        let running_before = session.clock().running();
        op(&mut session)?;
        self.hub.publish(&session);
        if session.status().is_terminal() {
            self.stop_ticker();
        } else if session.clock().running() != running_before {
            self.turn_changed.notify_one();
        }
        Ok(session.clone())
    }

    /// True once the session has been over for at least `retention`.
    fn expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        let session = self.lock();
        if !session.status().is_terminal() {
            return false;
        }
        session
            .finished_at()
            .is_some_and(|at| (now - at).to_std().is_ok_and(|elapsed| elapsed >= retention))
    }

    /// Charges one second to the running clock. Returns false once the
    /// ticker should stop.
    pub(crate) fn tick(&self) -> bool {
        let mut session = self.lock();
        if *session.status() != SessionStatus::InProgress {
            return false;
        }
        if session.tick_clock(1).is_some() {
            self.hub.publish(&session);
            return false;
        }
        true
    }

    fn set_ticker(&self, handle: AbortHandle) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = ticker.replace(handle) {
            previous.abort();
        }
    }

    fn stop_ticker(&self) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = ticker.take() {
            debug!("Stopping clock ticker");
            handle.abort();
        }
    }
}

/// A live feed of one session's snapshots.
///
/// The first item is the snapshot current at subscription time. A receiver
/// that falls behind is handed the current snapshot instead of the ones it
/// missed. The feed ends after a terminal snapshot or when the session is
/// dropped from the registry.
#[derive(Debug, new)]
#[new(visibility = "pub(crate)")]
pub struct Subscription {
    session_id: SessionId,
    slot: Weak<SessionSlot>,
    receiver: broadcast::Receiver<Session>,
    initial: Option<Session>,
    #[new(default)]
    last_revision: Option<u64>,
    #[new(default)]
    finished: bool,
}

impl Subscription {
    /// Session this feed belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Waits for the next snapshot.
    pub async fn next(&mut self) -> Option<Session> {
        if self.finished {
            return None;
        }
        if let Some(initial) = self.initial.take() {
            return Some(self.deliver(initial));
        }
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => {
                    if self.last_revision.is_some_and(|last| *snapshot.revision() <= last) {
                        continue;
                    }
                    return Some(self.deliver(snapshot));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(session_id = %self.session_id, skipped, "Subscriber lagged, resending current snapshot");
                    let slot = self.slot.upgrade()?;
                    let snapshot = slot.snapshot();
                    return Some(self.deliver(snapshot));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn deliver(&mut self, snapshot: Session) -> Session {
        self.last_revision = Some(*snapshot.revision());
        self.finished = snapshot.status().is_terminal();
        snapshot
    }
}

/// Sessions indexed by id and by join code.
#[derive(Debug, Default)]
struct Registry {
    by_id: HashMap<SessionId, Arc<SessionSlot>>,
    by_code: HashMap<String, SessionId>,
}

impl Registry {
    fn insert(&mut self, id: SessionId, slot: Arc<SessionSlot>) {
        self.by_code.insert(slot.code.clone(), id.clone());
        self.by_id.insert(id, slot);
    }

    fn remove(&mut self, session_id: &str) -> Option<Arc<SessionSlot>> {
        let slot = self.by_id.remove(session_id)?;
        self.by_code.remove(&slot.code);
        Some(slot)
    }
}

#[derive(Debug)]
struct Inner {
    registry: Mutex<Registry>,
    config: ServerConfig,
    rules: Rules,
    sweeper: Mutex<Option<AbortHandle>>,
}

/// Manages all game sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Creates an empty registry.
    #[instrument(skip(config))]
    pub fn new(config: ServerConfig) -> Self {
        info!(capture_policy = %config.capture_policy(), "Creating session manager");
        let rules = config.rules();
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                config,
                rules,
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Rule set applied to every session.
    pub fn rules(&self) -> Rules {
        self.inner.rules
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, session_id: &str) -> Result<Arc<SessionSlot>, SessionError> {
        self.registry()
            .by_id
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    /// Creates a session with `creator` as White. `time_control_secs`
    /// overrides the configured default; `Some(0)` disables clocks.
    #[instrument(skip(self, creator), fields(player_id = %creator.id))]
    pub fn create_session(&self, creator: PlayerInfo, time_control_secs: Option<u32>) -> Session {
        let time_control = match time_control_secs {
            Some(0) => None,
            Some(secs) => Some(secs),
            None => self.inner.config.default_time_control(),
        };

        let mut registry = self.registry();
        let id = uuid::Uuid::new_v4().to_string();
        let code = loop {
            let code = join_code();
            if !registry.by_code.contains_key(&code) {
                break code;
            }
        };

        let session = Session::new(id.clone(), code, creator, time_control);
        let snapshot = session.clone();
        let slot = Arc::new(SessionSlot::new(session, *self.inner.config.broadcast_capacity()));
        slot.hub.publish(&snapshot);
        registry.insert(id, slot);
        info!(session_id = %snapshot.id(), code = %snapshot.code(), "Session created");
        snapshot
    }

    /// Seats `player` as Black and starts the session's clock.
    #[instrument(skip(self, player), fields(player_id = %player.id))]
    pub fn join(&self, session_id: &str, player: PlayerInfo) -> Result<Session, SessionError> {
        let slot = self.slot(session_id)?;
        let snapshot = slot.mutate(|session| session.join(player))?;

        if snapshot.clock().enabled() {
            let period = Duration::from_millis(*self.inner.config.clock_tick_millis());
            if let Some(handle) = ticker::spawn(&slot, period) {
                slot.set_ticker(handle);
            }
        }
        info!(session_id, "Player joined");
        Ok(snapshot)
    }

    /// Validates and applies a move.
    #[instrument(skip(self, coords))]
    pub fn submit_move(
        &self,
        session_id: &str,
        player_id: &str,
        coords: MoveCoords,
    ) -> Result<Session, SessionError> {
        let rules = self.inner.rules;
        self.slot(session_id)?
            .mutate(|session| session.submit_coords(player_id, coords, &rules))
    }

    /// Resigns on behalf of `player_id`.
    #[instrument(skip(self))]
    pub fn resign(&self, session_id: &str, player_id: &str) -> Result<Session, SessionError> {
        self.slot(session_id)?
            .mutate(|session| session.resign(player_id))
    }

    /// Records that `player_id` disconnected; the session is abandoned.
    #[instrument(skip(self))]
    pub fn disconnect(&self, session_id: &str, player_id: &str) -> Result<Session, SessionError> {
        self.slot(session_id)?
            .mutate(|session| session.abandon(player_id))
    }

    /// Current snapshot of a session.
    pub fn get(&self, session_id: &str) -> Result<Session, SessionError> {
        Ok(self.slot(session_id)?.snapshot())
    }

    /// Looks up a session by its join code, ignoring case.
    #[instrument(skip(self))]
    pub fn find_by_code(&self, code: &str) -> Result<Session, SessionError> {
        let wanted = code.trim().to_uppercase();
        let slot = {
            let registry = self.registry();
            registry
                .by_code
                .get(&wanted)
                .and_then(|id| registry.by_id.get(id))
                .cloned()
        };
        slot.map(|slot| slot.snapshot())
            .ok_or_else(|| SessionError::SessionNotFound(code.to_string()))
    }

    /// Subscribes to a session's snapshots.
    #[instrument(skip(self))]
    pub fn subscribe(&self, session_id: &str) -> Result<Subscription, SessionError> {
        let slot = self.slot(session_id)?;
        // Snapshot and receiver taken under the session lock so no
        // publish can fall between them.
        let session = slot.lock();
        let receiver = slot.hub.subscribe();
        let initial = session.clone();
        drop(session);
        debug!(receivers = slot.hub.receiver_count(), "Subscriber attached");

        Ok(Subscription::new(
            session_id.to_string(),
            Arc::downgrade(&slot),
            receiver,
            Some(initial),
        ))
    }

    /// Number of sessions in the registry.
    pub fn session_count(&self) -> usize {
        self.registry().by_id.len()
    }

    /// Drops terminal sessions that ended longer than the retention window
    /// ago. Returns how many were evicted.
    #[instrument(skip(self))]
    pub fn evict_finished(&self) -> usize {
        let retention = self.inner.config.finished_retention();
        let now = Utc::now();
        let mut registry = self.registry();
        let expired: Vec<SessionId> = registry
            .by_id
            .iter()
            .filter(|(_, slot)| slot.expired(now, retention))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(slot) = registry.remove(id) {
                slot.stop_ticker();
            }
        }
        if !expired.is_empty() {
            info!(
                evicted = expired.len(),
                remaining = registry.by_id.len(),
                "Evicted finished sessions"
            );
        }
        expired.len()
    }

    /// Starts the periodic eviction sweep, replacing any running one.
    /// Returns false outside a Tokio runtime.
    pub fn start_eviction(&self) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("No Tokio runtime, finished sessions will not be evicted");
            return false;
        };
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.eviction_period();

        let task = handle.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SessionManager { inner }.evict_finished();
            }
            debug!("Eviction sweep exited");
        });

        let mut sweeper = self.inner.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = sweeper.replace(task.abort_handle()) {
            previous.abort();
        }
        true
    }

    /// Stops every ticker and drops all sessions, which ends every
    /// subscription.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        if let Some(sweeper) = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sweeper.abort();
        }
        let drained: Vec<Arc<SessionSlot>> = {
            let mut registry = self.registry();
            registry.by_code.clear();
            registry.by_id.drain().map(|(_, slot)| slot).collect()
        };
        for slot in &drained {
            slot.stop_ticker();
        }
        info!(sessions = drained.len(), "Session manager shut down");
    }
}

/// Eight uppercase hex characters.
fn join_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_checkers::{FinishReason, Side};

    fn manager() -> SessionManager {
        SessionManager::new(ServerConfig::default().with_default_time_control_secs(0u32))
    }

    fn coords(origin_row: u8, origin_col: u8, dest_row: u8, dest_col: u8) -> MoveCoords {
        MoveCoords {
            origin_row,
            origin_col,
            dest_row,
            dest_col,
        }
    }

    #[test]
    fn create_then_find_by_code() {
        let manager = manager();
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        assert_eq!(session.code().len(), 8);
        let found = manager.find_by_code(&session.code().to_lowercase()).unwrap();
        assert_eq!(found.id(), session.id());
        assert!(!session.clock().enabled());
    }

    #[test]
    fn unknown_session_is_not_found() {
        let manager = manager();
        assert_eq!(
            manager.get("missing"),
            Err(SessionError::SessionNotFound("missing".to_string()))
        );
        assert!(matches!(
            manager.submit_move("missing", "a", coords(2, 1, 3, 2)),
            Err(SessionError::SessionNotFound(_))
        ));
    }

    #[test]
    fn turn_checks_precede_coordinate_checks() {
        let manager = manager();
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        manager.join(session.id(), PlayerInfo::new("b", "Bob")).unwrap();
        assert_eq!(
            manager.submit_move(session.id(), "b", coords(9, 9, 9, 9)),
            Err(SessionError::NotYourTurn)
        );
        assert!(matches!(
            manager.submit_move(session.id(), "a", coords(9, 9, 9, 9)),
            Err(SessionError::InvalidCoordinates(_))
        ));
    }

    #[tokio::test]
    async fn subscription_starts_with_current_snapshot() {
        let manager = manager();
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        manager.join(session.id(), PlayerInfo::new("b", "Bob")).unwrap();

        let mut feed = manager.subscribe(session.id()).unwrap();
        let first = feed.next().await.unwrap();
        assert_eq!(*first.revision(), 1);

        manager.submit_move(session.id(), "a", coords(2, 1, 3, 2)).unwrap();
        let second = feed.next().await.unwrap();
        assert_eq!(*second.revision(), 2);
        assert_eq!(*second.side_to_move(), Side::Black);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_current_snapshot() {
        let manager = SessionManager::new(
            ServerConfig::default()
                .with_default_time_control_secs(0u32)
                .with_broadcast_capacity(1usize),
        );
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        manager.join(session.id(), PlayerInfo::new("b", "Bob")).unwrap();
        let mut feed = manager.subscribe(session.id()).unwrap();
        feed.next().await.unwrap();

        manager.submit_move(session.id(), "a", coords(2, 1, 3, 2)).unwrap();
        manager.submit_move(session.id(), "b", coords(5, 0, 4, 1)).unwrap();
        manager.submit_move(session.id(), "a", coords(2, 3, 3, 4)).unwrap();

        let caught_up = feed.next().await.unwrap();
        assert_eq!(*caught_up.revision(), 4);
    }

    #[tokio::test]
    async fn feed_ends_after_terminal_snapshot() {
        let manager = manager();
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        manager.join(session.id(), PlayerInfo::new("b", "Bob")).unwrap();
        let mut feed = manager.subscribe(session.id()).unwrap();
        feed.next().await.unwrap();

        let resigned = manager.resign(session.id(), "a").unwrap();
        assert_eq!(*resigned.finish_reason(), Some(FinishReason::Resignation));
        let last = feed.next().await.unwrap();
        assert_eq!(*last.status(), SessionStatus::Finished);
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_feeds() {
        let manager = manager();
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        let mut feed = manager.subscribe(session.id()).unwrap();
        feed.next().await.unwrap();
        manager.shutdown();
        assert_eq!(manager.session_count(), 0);
        assert!(feed.next().await.is_none());
    }

    #[test]
    fn finished_sessions_are_evicted_after_retention() {
        let manager = SessionManager::new(
            ServerConfig::default()
                .with_default_time_control_secs(0u32)
                .with_finished_retention_secs(0u64),
        );
        let finished = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        manager.join(finished.id(), PlayerInfo::new("b", "Bob")).unwrap();
        manager.resign(finished.id(), "a").unwrap();
        let waiting = manager.create_session(PlayerInfo::new("c", "Cid"), None);

        assert_eq!(manager.evict_finished(), 1);
        assert_eq!(manager.session_count(), 1);
        assert!(matches!(
            manager.get(finished.id()),
            Err(SessionError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.find_by_code(finished.code()),
            Err(SessionError::SessionNotFound(_))
        ));
        assert_eq!(manager.get(waiting.id()).unwrap().id(), waiting.id());
        assert_eq!(manager.evict_finished(), 0);
    }

    #[test]
    fn finished_sessions_stay_readable_within_retention() {
        let manager = manager();
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        manager.join(session.id(), PlayerInfo::new("b", "Bob")).unwrap();
        manager.resign(session.id(), "b").unwrap();

        assert_eq!(manager.evict_finished(), 0);
        let kept = manager.find_by_code(session.code()).unwrap();
        assert_eq!(*kept.status(), SessionStatus::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_sweep_runs_in_the_background() {
        let manager = SessionManager::new(
            ServerConfig::default()
                .with_default_time_control_secs(0u32)
                .with_finished_retention_secs(0u64),
        );
        assert!(manager.start_eviction());
        let session = manager.create_session(PlayerInfo::new("a", "Alice"), None);
        manager.join(session.id(), PlayerInfo::new("b", "Bob")).unwrap();
        manager.resign(session.id(), "a").unwrap();
        assert_eq!(manager.session_count(), 1);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(manager.session_count(), 0);
        manager.shutdown();
    }
}
