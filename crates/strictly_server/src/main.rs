//! Strictly Checkers - server CLI

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use strictly_server::{ServerConfig, SessionManager, serve};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_server=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => run_server(config, host, port).await,
        Command::CheckConfig { config } => check_config(config),
    }
}

/// Run the HTTP game server
#[instrument]
async fn run_server(config: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::load(config.as_deref()).context("Failed to load config")?;
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }

    info!(
        addr = %config.bind_addr(),
        capture_policy = %config.capture_policy(),
        time_control = ?config.default_time_control(),
        "Starting Strictly Checkers server"
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    let manager = SessionManager::new(config);

    serve(listener, manager, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Validate a config file and print it
#[instrument]
fn check_config(path: PathBuf) -> Result<()> {
    let config = ServerConfig::from_file(&path).context("Invalid config")?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
