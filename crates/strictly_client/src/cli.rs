//! Command-line interface for strictly_client.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Checkers - participant client
#[derive(Parser, Debug)]
#[command(name = "strictly_client")]
#[command(about = "Play checkers against a Strictly Checkers server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL (overrides config)
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Identity sent with every request
#[derive(Args, Debug, Clone)]
pub struct PlayerArgs {
    /// Player ID
    #[arg(long)]
    pub player_id: String,

    /// Display name (defaults to the player ID)
    #[arg(long)]
    pub name: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a session and print its join code
    Create {
        #[command(flatten)]
        player: PlayerArgs,

        /// Seconds per side; 0 plays without clocks
        #[arg(short, long)]
        time_control: Option<u32>,
    },

    /// Join a session by its join code
    Join {
        #[command(flatten)]
        player: PlayerArgs,

        /// Join code
        code: String,
    },

    /// Submit a move, e.g. `move SESSION 2 1 3 0`
    Move {
        /// Player ID
        #[arg(long)]
        player_id: String,

        /// Session ID
        session: String,

        /// Origin row
        origin_row: u8,

        /// Origin column
        origin_col: u8,

        /// Destination row
        dest_row: u8,

        /// Destination column
        dest_col: u8,
    },

    /// Resign a session
    Resign {
        /// Player ID
        #[arg(long)]
        player_id: String,

        /// Session ID
        session: String,
    },

    /// Print the current state of a session
    Show {
        /// Session ID
        session: String,
    },

    /// List the moves available to the side to move
    Moves {
        /// Session ID
        session: String,
    },

    /// Follow a session live until it ends or the connection is lost
    Watch {
        /// Session ID
        session: String,
    },
}
