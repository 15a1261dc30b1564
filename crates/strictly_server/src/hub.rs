//! Per-session snapshot broadcast.

use strictly_checkers::Session;
use tokio::sync::broadcast;
use tracing::trace;

/// Fan-out of authoritative snapshots for one session.
///
/// Publishing is done by the owner of the session lock, so every receiver
/// sees snapshots in the order they were produced.
#[derive(Debug)]
pub(crate) struct SnapshotHub {
    sender: broadcast::Sender<Session>,
}

impl SnapshotHub {
    /// Creates a hub buffering up to `capacity` snapshots per receiver.
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends a snapshot to every current receiver.
    pub(crate) fn publish(&self, snapshot: &Session) {
        // No receivers is not an error: nobody is watching yet.
        let delivered = self.sender.send(snapshot.clone()).unwrap_or(0);
        trace!(
            session_id = %snapshot.id(),
            revision = snapshot.revision(),
            delivered,
            "Published snapshot"
        );
    }

    /// New receiver that sees every snapshot published from now on.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Session> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub(crate) fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
