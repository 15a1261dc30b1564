//! Strictly Checkers - client CLI

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, PlayerArgs};
use strictly_checkers::{Move, PlayerInfo, Session};
use strictly_client::{
    ClientConfig, ConnectionState, GameClient, HttpSnapshotSource, LocalView, SyncClient,
    SyncEvent,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_client=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(server) = cli.server {
        config = config.with_server_url(server);
    }
    config.validate().context("Invalid config")?;
    let client = GameClient::new(config.server_url(), config.request_timeout())?;

    match cli.command {
        Command::Create {
            player,
            time_control,
        } => create(&client, player, time_control).await,
        Command::Join { player, code } => join(&client, player, &code).await,
        Command::Move {
            player_id,
            session,
            origin_row,
            origin_col,
            dest_row,
            dest_col,
        } => {
            let mv = Move::from_coords(origin_row, origin_col, dest_row, dest_col)?;
            let snapshot = client.submit_move(&session, &player_id, &mv).await?;
            print_session(&snapshot);
            Ok(())
        }
        Command::Resign { player_id, session } => {
            let snapshot = client.resign(&session, &player_id).await?;
            print_session(&snapshot);
            Ok(())
        }
        Command::Show { session } => {
            let snapshot = client.get_session(&session).await?;
            print_session(&snapshot);
            Ok(())
        }
        Command::Moves { session } => moves(&client, &config, &session).await,
        Command::Watch { session } => watch(client, &config, &session).await,
    }
}

fn player_info(args: PlayerArgs) -> PlayerInfo {
    let name = args.name.unwrap_or_else(|| args.player_id.clone());
    PlayerInfo::new(args.player_id, name)
}

/// Create a session and print its join code
#[instrument(skip(client))]
async fn create(client: &GameClient, player: PlayerArgs, time_control: Option<u32>) -> Result<()> {
    let session = client
        .create_session(player_info(player), time_control)
        .await
        .context("Failed to create session")?;
    println!("Session {} created, join code {}", session.id(), session.code());
    Ok(())
}

/// Join a session by code
#[instrument(skip(client))]
async fn join(client: &GameClient, player: PlayerArgs, code: &str) -> Result<()> {
    let found = client
        .find_by_code(code)
        .await
        .context("No session with that code")?;
    let session = client.join(found.id(), player_info(player)).await?;
    print_session(&session);
    Ok(())
}

/// Print the legal moves for the side to move under the configured rules
#[instrument(skip(client, config))]
async fn moves(client: &GameClient, config: &ClientConfig, session_id: &str) -> Result<()> {
    let mut view = LocalView::new();
    view.apply(client.get_session(session_id).await?);
    let Some(session) = view.snapshot() else {
        anyhow::bail!("No snapshot for session {session_id}");
    };
    let legal = view.legal_moves(&config.rules());
    if legal.is_empty() {
        println!("No moves available, session is {}", session.status());
        return Ok(());
    }
    println!("{} to move:", session.side_to_move());
    for mv in legal {
        println!("  {mv}");
    }
    Ok(())
}

/// Follow a session's snapshots and print each one
#[instrument(skip(client, config))]
async fn watch(client: GameClient, config: &ClientConfig, session_id: &str) -> Result<()> {
    let mut sync = SyncClient::new(HttpSnapshotSource::new(client), *config.reconnect());
    let mut events = sync.subscribe(session_id);
    let mut view = LocalView::new();

    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::Snapshot(snapshot) => {
                if view.apply(*snapshot) {
                    println!("{}", view.render());
                }
            }
            SyncEvent::Connection(ConnectionState::Connected) => info!("Connected"),
            SyncEvent::Connection(ConnectionState::Reconnecting { attempt }) => {
                warn!(attempt, "Connection interrupted, reconnecting");
            }
            SyncEvent::Connection(ConnectionState::Disconnected) => {
                anyhow::bail!("Connection lost");
            }
            SyncEvent::Ended => {
                info!("Session ended");
                break;
            }
        }
    }
    Ok(())
}

fn print_session(session: &Session) {
    let mut view = LocalView::new();
    view.apply(session.clone());
    println!("Session {} (revision {})", session.id(), session.revision());
    println!("{}", view.render());
}
