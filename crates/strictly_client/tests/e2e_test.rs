//! Client against a real server on a loopback port.

use std::time::Duration;
use strictly_checkers::{
    ErrorKind, Move, PlayerInfo, Position, Rules, Session, SessionStatus, Side,
};
use strictly_client::{
    ClickOutcome, ClientError, ConnectionState, GameClient, HttpSnapshotSource, ReconnectPolicy,
    SyncClient, SyncEvent, Table,
};
use strictly_server::{ServerConfig, SessionManager, serve};
use tokio::sync::oneshot;
use tokio::time::timeout;

struct TestServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn start_server() -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    let manager = SessionManager::new(ServerConfig::default().with_default_time_control_secs(0u32));
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = serve(listener, manager, async {
            let _ = rx.await;
        })
        .await;
    });
    TestServer {
        url,
        shutdown: Some(tx),
    }
}

fn policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_backoff_millis: 50,
        max_backoff_millis: 200,
        max_retries: 2,
    }
}

fn table(url: &str, id: &str, name: &str) -> Table {
    let client = GameClient::new(url, Duration::from_secs(5)).expect("client");
    let sync = SyncClient::new(HttpSnapshotSource::new(client.clone()), policy());
    Table::new(client, sync, PlayerInfo::new(id, name), Rules::default())
}

fn pos(row: u8, col: u8) -> Position {
    Position::new(row, col).unwrap()
}

/// Pumps events until the view holds a snapshot matching `pred`.
async fn wait_for(table: &mut Table, pred: impl Fn(&Session) -> bool) -> Session {
    timeout(Duration::from_secs(5), async {
        loop {
            if let Some(snapshot) = table.view().snapshot()
                && pred(snapshot)
            {
                return snapshot.clone();
            }
            table.next_event().await.expect("subscription ended early");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

#[tokio::test]
async fn two_players_see_the_same_game() {
    let server = start_server().await;
    let mut alice = table(&server.url, "alice", "Alice");
    let mut bob = table(&server.url, "bob", "Bob");

    let created = alice.create(None).await.expect("create");
    assert_eq!(created.status(), &SessionStatus::Waiting);

    let joined = bob.join_by_code(&created.code().to_lowercase()).await.expect("join");
    assert_eq!(joined.id(), created.id());
    assert_eq!(joined.status(), &SessionStatus::InProgress);

    // Alice learns about the join through her subscription.
    wait_for(&mut alice, |s| s.status() == &SessionStatus::InProgress).await;
    assert_eq!(alice.connection(), ConnectionState::Connected);

    // Out of turn clicks never reach the server.
    assert_eq!(bob.click(pos(5, 0)).await.unwrap(), ClickOutcome::Ignored);

    assert_eq!(
        alice.click(pos(2, 1)).await.unwrap(),
        ClickOutcome::Selected(pos(2, 1))
    );
    assert_eq!(
        alice.click(pos(3, 0)).await.unwrap(),
        ClickOutcome::Submit(Move::new(pos(2, 1), pos(3, 0)))
    );

    let seen_by_bob = wait_for(&mut bob, |s| *s.revision() >= 2).await;
    assert_eq!(*seen_by_bob.side_to_move(), Side::Black);
    assert!(seen_by_bob.board().piece_at(pos(3, 0)).is_some());
    assert!(seen_by_bob.board().is_empty(pos(2, 1)));

    bob.click(pos(5, 0)).await.unwrap();
    bob.click(pos(4, 1)).await.unwrap();
    let seen_by_alice = wait_for(&mut alice, |s| *s.revision() >= 3).await;
    assert_eq!(*seen_by_alice.side_to_move(), Side::White);
    assert_eq!(seen_by_alice.history().len(), 2);
}

#[tokio::test]
async fn rejected_move_leaves_view_and_surfaces_message() {
    let server = start_server().await;
    let mut alice = table(&server.url, "alice", "Alice");
    let mut bob = table(&server.url, "bob", "Bob");

    let created = alice.create(None).await.expect("create");
    bob.join_by_code(created.code()).await.expect("join");
    let before = wait_for(&mut alice, |s| s.status() == &SessionStatus::InProgress).await;

    // Diagonal but two squares with nothing to jump.
    alice.click(pos(2, 1)).await.unwrap();
    let outcome = alice.click(pos(4, 3)).await.expect("rule violations are recovered");
    assert!(matches!(outcome, ClickOutcome::Submit(_)));
    assert_eq!(
        alice.controller().last_error().as_deref(),
        Some("Move is not a legal diagonal step or jump")
    );
    assert_eq!(alice.view().snapshot(), Some(&before));

    // The controller is idle again and accepts a new selection.
    assert_eq!(
        alice.click(pos(2, 1)).await.unwrap(),
        ClickOutcome::Selected(pos(2, 1))
    );
}

#[tokio::test]
async fn rest_errors_carry_kind_and_code() {
    let server = start_server().await;
    let client = GameClient::new(&server.url, Duration::from_secs(5)).expect("client");

    let err = client.get_session("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let created = client
        .create_session(PlayerInfo::new("alice", "Alice"), None)
        .await
        .unwrap();
    client
        .join(created.id(), PlayerInfo::new("bob", "Bob"))
        .await
        .unwrap();

    let err = client
        .submit_move(created.id(), "bob", &Move::new(pos(5, 0), pos(4, 1)))
        .await
        .unwrap_err();
    match err {
        ClientError::Api { kind, code, .. } => {
            assert_eq!(kind, ErrorKind::Conflict);
            assert_eq!(code, "notYourTurn");
        }
        other => panic!("expected an API error, got {other:?}"),
    }

    client.resign(created.id(), "alice").await.unwrap();
    let err = client.resign(created.id(), "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotActive);
}

#[tokio::test]
async fn subscription_ends_after_resignation() {
    let server = start_server().await;
    let mut alice = table(&server.url, "alice", "Alice");
    let mut bob = table(&server.url, "bob", "Bob");

    let created = alice.create(None).await.expect("create");
    bob.join_by_code(created.code()).await.expect("join");
    wait_for(&mut bob, |s| s.status() == &SessionStatus::InProgress).await;

    alice.resign().await.expect("resign");
    let last = wait_for(&mut bob, |s| s.status().is_terminal()).await;
    assert_eq!(last.status(), &SessionStatus::Finished);
    assert_eq!(last.winner_player().map(|p| p.id.as_str()), Some("bob"));

    let rest = timeout(Duration::from_secs(5), async {
        let mut rest = Vec::new();
        while let Some(event) = bob.next_event().await {
            rest.push(event);
        }
        rest
    })
    .await
    .expect("subscription should close");
    assert_eq!(rest.last(), Some(&SyncEvent::Ended));
}

#[tokio::test]
async fn unknown_session_is_not_retried() {
    let server = start_server().await;
    let client = GameClient::new(&server.url, Duration::from_secs(5)).expect("client");
    let mut sync = SyncClient::new(HttpSnapshotSource::new(client), policy());
    let mut events = sync.subscribe("missing");

    let first = timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(
        first,
        Some(SyncEvent::Connection(ConnectionState::Disconnected))
    );
}

#[tokio::test]
async fn server_shutdown_ends_in_disconnected() {
    let mut server = start_server().await;
    let mut alice = table(&server.url, "alice", "Alice");
    alice.create(None).await.expect("create");
    wait_for(&mut alice, |s| s.status() == &SessionStatus::Waiting).await;

    drop(server.shutdown.take());

    let states = timeout(Duration::from_secs(10), async {
        let mut states = Vec::new();
        while let Some(event) = alice.next_event().await {
            if let SyncEvent::Connection(state) = event {
                states.push(state);
            }
        }
        states
    })
    .await
    .expect("subscription should give up");
    assert_eq!(states.last(), Some(&ConnectionState::Disconnected));
    assert_eq!(alice.connection(), ConnectionState::Disconnected);
    assert!(!alice.controller().connected());
}
