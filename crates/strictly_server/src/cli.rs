//! Command-line interface for strictly_server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Checkers - authoritative game server
#[derive(Parser, Debug)]
#[command(name = "strictly_server")]
#[command(about = "Authoritative checkers server with live snapshot streams", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate a config file and print the effective settings
    CheckConfig {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: PathBuf,
    },
}
