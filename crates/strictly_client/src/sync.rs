//! Snapshot synchronization.
//!
//! A [`SyncClient`] keeps at most one live subscription to a session's
//! snapshots. The subscription runs in its own task and reports
//! [`SyncEvent`]s over an mpsc channel. Transport failures are retried with
//! bounded exponential backoff; once the budget is spent the connection is
//! reported [`ConnectionState::Disconnected`].

use crate::error::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strictly_checkers::Session;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// A live stream of snapshots for one session.
#[async_trait]
pub trait SnapshotStream: Send {
    /// Next snapshot. `None` means the server closed the stream.
    async fn next(&mut self) -> Option<Result<Session, ClientError>>;
}

/// Opens snapshot streams.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    /// Opens a stream for `session_id`. The first item is the current snapshot.
    async fn open(&self, session_id: &str) -> Result<Box<dyn SnapshotStream>, ClientError>;
}

/// Resubscription schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_backoff_millis: u64,
    /// Upper bound on any single delay.
    pub max_backoff_millis: u64,
    /// Retries allowed before giving up.
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_millis: 1000,
            max_backoff_millis: 5000,
            max_retries: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based): doubling from the
    /// initial delay, capped at the maximum.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_millis
            .saturating_mul(factor)
            .min(self.max_backoff_millis);
        Duration::from_millis(millis)
    }

    /// Returns true if retry number `attempt` is within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

/// Health of the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Stream open.
    Connected,
    /// Waiting before resubscription `attempt`.
    Reconnecting {
        /// 1-based retry number.
        attempt: u32,
    },
    /// Gave up; move submission should be disabled.
    Disconnected,
}

/// Events reported by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An authoritative snapshot.
    Snapshot(Box<Session>),
    /// The connection state changed.
    Connection(ConnectionState),
    /// The session reached a terminal state; no more snapshots will come.
    Ended,
}

#[derive(Debug)]
struct ActiveSubscription {
    session_id: String,
    task: JoinHandle<()>,
}

/// Subscribes to session snapshots, at most one session at a time.
pub struct SyncClient {
    source: Arc<dyn SnapshotSource>,
    policy: ReconnectPolicy,
    channel_capacity: usize,
    active: Option<ActiveSubscription>,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("policy", &self.policy)
            .field("active", &self.active.as_ref().map(|a| &a.session_id))
            .finish()
    }
}

impl SyncClient {
    /// Creates a client over `source`.
    pub fn new(source: impl SnapshotSource, policy: ReconnectPolicy) -> Self {
        Self {
            source: Arc::new(source),
            policy,
            channel_capacity: 64,
            active: None,
        }
    }

    /// Subscribes to `session_id`, replacing any previous subscription.
    ///
    /// The returned receiver yields events until the session ends, the
    /// connection is given up, or the subscription is replaced.
    #[must_use = "the event receiver must be used to receive events"]
    #[instrument(skip(self))]
    pub fn subscribe(&mut self, session_id: &str) -> mpsc::Receiver<SyncEvent> {
        self.unsubscribe();
        let (tx, rx) = mpsc::channel(self.channel_capacity.max(1));
        let task = tokio::spawn(sync_loop(
            Arc::clone(&self.source),
            session_id.to_string(),
            self.policy,
            tx,
        ));
        self.active = Some(ActiveSubscription {
            session_id: session_id.to_string(),
            task,
        });
        info!("Subscribed");
        rx
    }

    /// Tears down the active subscription, if any.
    pub fn unsubscribe(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(session_id = %active.session_id, "Unsubscribing");
            active.task.abort();
        }
    }

    /// Session currently subscribed to.
    pub fn active_session(&self) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|a| !a.task.is_finished())
            .map(|a| a.session_id.as_str())
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Runs one subscription until it ends, is given up, or the receiver goes away.
async fn sync_loop(
    source: Arc<dyn SnapshotSource>,
    session_id: String,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<SyncEvent>,
) {
    let mut attempt = 0u32;
    loop {
        match source.open(&session_id).await {
            Ok(mut stream) => {
                if !emit(&tx, SyncEvent::Connection(ConnectionState::Connected)).await {
                    return;
                }
                loop {
                    match stream.next().await {
                        Some(Ok(snapshot)) => {
                            // Only a delivered snapshot proves the link is healthy.
                            attempt = 0;
                            let terminal = snapshot.status().is_terminal();
                            if !emit(&tx, SyncEvent::Snapshot(Box::new(snapshot))).await {
                                return;
                            }
                            if terminal {
                                debug!(session_id = %session_id, "Session ended");
                                emit(&tx, SyncEvent::Ended).await;
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(session_id = %session_id, error = %e, "Snapshot stream failed");
                            break;
                        }
                        None => {
                            warn!(session_id = %session_id, "Snapshot stream closed by server");
                            break;
                        }
                    }
                }
            }
            Err(e) if e.is_retryable() => {
                warn!(session_id = %session_id, error = %e, "Failed to open snapshot stream");
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Subscription refused");
                emit(&tx, SyncEvent::Connection(ConnectionState::Disconnected)).await;
                return;
            }
        }

        attempt += 1;
        if !policy.allows(attempt) {
            warn!(session_id = %session_id, "Connection lost");
            emit(&tx, SyncEvent::Connection(ConnectionState::Disconnected)).await;
            return;
        }
        if !emit(&tx, SyncEvent::Connection(ConnectionState::Reconnecting { attempt })).await {
            return;
        }
        tokio::time::sleep(policy.delay(attempt)).await;
    }
}

/// Sends an event; false once the receiver is gone.
async fn emit(tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) -> bool {
    if tx.send(event).await.is_err() {
        debug!("Event receiver dropped");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use strictly_checkers::PlayerInfo;
    use tokio::time::Instant;

    type Script = Result<Vec<Option<Result<Session, ClientError>>>, ClientError>;

    /// Replays scripted opens; each open pops one script.
    struct MockSource {
        scripts: Mutex<VecDeque<Script>>,
        opens: Arc<Mutex<Vec<Instant>>>,
    }

    impl MockSource {
        fn new(scripts: Vec<Script>) -> (Self, Arc<Mutex<Vec<Instant>>>) {
            let opens = Arc::new(Mutex::new(Vec::new()));
            let source = Self {
                scripts: Mutex::new(VecDeque::from(scripts)),
                opens: Arc::clone(&opens),
            };
            (source, opens)
        }
    }

    struct MockStream {
        items: VecDeque<Option<Result<Session, ClientError>>>,
    }

    #[async_trait]
    impl SnapshotStream for MockStream {
        async fn next(&mut self) -> Option<Result<Session, ClientError>> {
            match self.items.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for MockSource {
        async fn open(&self, _session_id: &str) -> Result<Box<dyn SnapshotStream>, ClientError> {
            self.opens.lock().unwrap().push(Instant::now());
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("refused".into())));
            script.map(|items| {
                Box::new(MockStream {
                    items: items.into(),
                }) as Box<dyn SnapshotStream>
            })
        }
    }

    fn snapshot(revision_bumps: u32) -> Session {
        let mut session = Session::new(
            "s1".into(),
            "CODE1234".into(),
            PlayerInfo::new("a", "Alice"),
            None,
        );
        if revision_bumps > 0 {
            session.join(PlayerInfo::new("b", "Bob")).unwrap();
        }
        session
    }

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff_millis: 100,
            max_backoff_millis: 400,
            max_retries: 3,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(10), Duration::from_millis(400));
        assert_eq!(policy.delay(200), Duration::from_millis(400));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retry_budget() {
        let (source, opens) = MockSource::new(vec![]);
        let mut client = SyncClient::new(source, policy());
        let mut rx = client.subscribe("s1");

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                SyncEvent::Connection(ConnectionState::Reconnecting { attempt: 1 }),
                SyncEvent::Connection(ConnectionState::Reconnecting { attempt: 2 }),
                SyncEvent::Connection(ConnectionState::Reconnecting { attempt: 3 }),
                SyncEvent::Connection(ConnectionState::Disconnected),
            ]
        );

        let opens = opens.lock().unwrap();
        assert_eq!(opens.len(), 4);
        let gaps: Vec<Duration> = opens.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_stream_failure() {
        let (source, _opens) = MockSource::new(vec![
            Ok(vec![
                Some(Ok(snapshot(0))),
                Some(Err(ClientError::Transport("reset".into()))),
            ]),
            Ok(vec![Some(Ok(snapshot(1)))]),
        ]);
        let mut client = SyncClient::new(source, policy());
        let mut rx = client.subscribe("s1");

        assert_eq!(
            rx.recv().await,
            Some(SyncEvent::Connection(ConnectionState::Connected))
        );
        assert!(matches!(rx.recv().await, Some(SyncEvent::Snapshot(s)) if *s.revision() == 0));
        assert_eq!(
            rx.recv().await,
            Some(SyncEvent::Connection(ConnectionState::Reconnecting { attempt: 1 }))
        );
        assert_eq!(
            rx.recv().await,
            Some(SyncEvent::Connection(ConnectionState::Connected))
        );
        assert!(matches!(rx.recv().await, Some(SyncEvent::Snapshot(s)) if *s.revision() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_failing_right_after_open_still_exhausts_budget() {
        let scripts = (0..10)
            .map(|_| Ok(vec![Some(Err(ClientError::Transport("reset".into())))]))
            .collect();
        let (source, opens) = MockSource::new(scripts);
        let mut client = SyncClient::new(source, policy());
        let mut rx = client.subscribe("s1");

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                SyncEvent::Connection(ConnectionState::Connected),
                SyncEvent::Connection(ConnectionState::Reconnecting { attempt: 1 }),
                SyncEvent::Connection(ConnectionState::Connected),
                SyncEvent::Connection(ConnectionState::Reconnecting { attempt: 2 }),
                SyncEvent::Connection(ConnectionState::Connected),
                SyncEvent::Connection(ConnectionState::Reconnecting { attempt: 3 }),
                SyncEvent::Connection(ConnectionState::Connected),
                SyncEvent::Connection(ConnectionState::Disconnected),
            ]
        );
        assert_eq!(opens.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn delivered_snapshot_restores_the_retry_budget() {
        let reset = || Some(Err(ClientError::Transport("reset".into())));
        let (source, opens) = MockSource::new(vec![
            Ok(vec![reset()]),
            Ok(vec![reset()]),
            Ok(vec![Some(Ok(snapshot(0))), reset()]),
        ]);
        let mut client = SyncClient::new(source, policy());
        let mut rx = client.subscribe("s1");

        let mut reconnects = Vec::new();
        while let Some(event) = rx.recv().await {
            if let SyncEvent::Connection(ConnectionState::Reconnecting { attempt }) = event {
                reconnects.push(attempt);
            }
        }
        // Two failed streams, a healthy one, then the fallback refusals.
        assert_eq!(reconnects, vec![1, 2, 1, 2, 3]);
        assert_eq!(opens.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let (source, opens) = MockSource::new(vec![Err(ClientError::Api {
            kind: strictly_checkers::ErrorKind::NotFound,
            code: "sessionNotFound".into(),
            message: "Session s1 not found".into(),
        })]);
        let mut client = SyncClient::new(source, policy());
        let mut rx = client.subscribe("s1");
        assert_eq!(
            rx.recv().await,
            Some(SyncEvent::Connection(ConnectionState::Disconnected))
        );
        assert_eq!(rx.recv().await, None);
        assert_eq!(opens.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resubscribing_replaces_the_previous_subscription() {
        let (source, _opens) = MockSource::new(vec![
            Ok(vec![Some(Ok(snapshot(0)))]),
            Ok(vec![Some(Ok(snapshot(1)))]),
        ]);
        let mut client = SyncClient::new(source, policy());
        let mut first = client.subscribe("s1");
        assert_eq!(
            first.recv().await,
            Some(SyncEvent::Connection(ConnectionState::Connected))
        );

        let mut second = client.subscribe("s2");
        // The first task was aborted; its sender is gone once buffered
        // events are drained.
        while first.recv().await.is_some() {}
        assert_eq!(
            second.recv().await,
            Some(SyncEvent::Connection(ConnectionState::Connected))
        );
        assert_eq!(client.active_session(), Some("s2"));

        client.unsubscribe();
        assert_eq!(client.active_session(), None);
    }
}
