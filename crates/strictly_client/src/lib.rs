//! Participant side of Strictly Checkers.
//!
//! A participant talks to the server two ways:
//!
//! - **Upstream**, move intents go out as plain request/response calls
//!   through [`GameClient`]. The reply is the resulting snapshot.
//! - **Downstream**, [`SyncClient`] holds one live snapshot subscription per
//!   participant, retrying transport failures with bounded exponential
//!   backoff ([`ReconnectPolicy`]) and reporting [`ConnectionState`] changes.
//!
//! Snapshots are full truth. [`LocalView`] replaces its state with each one
//! whose revision is newer than what it holds, and [`InteractionController`]
//! turns clicks into move intents against that view. [`Table`] wires the
//! pieces together for one seated player.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use strictly_checkers::{PlayerInfo, Rules};
//! use strictly_client::{GameClient, HttpSnapshotSource, ReconnectPolicy, SyncClient, Table};
//!
//! # async fn example() -> Result<(), strictly_client::ClientError> {
//! let client = GameClient::new("http://127.0.0.1:3000", Duration::from_secs(10))?;
//! let sync = SyncClient::new(HttpSnapshotSource::new(client.clone()), ReconnectPolicy::default());
//! let mut table = Table::new(client, sync, PlayerInfo::new("p1", "Alice"), Rules::default());
//!
//! let session = table.create(Some(300)).await?;
//! println!("Share join code {}", session.code());
//! while let Some(event) = table.next_event().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod interaction;
mod rest_client;
mod sse;
mod sync;
mod table;
mod view;

pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use interaction::{ClickOutcome, InteractionController, Selection};
pub use rest_client::GameClient;
pub use sse::{HttpSnapshotSource, SseMessage, SseParser};
pub use sync::{
    ConnectionState, ReconnectPolicy, SnapshotSource, SnapshotStream, SyncClient, SyncEvent,
};
pub use table::Table;
pub use view::{LocalView, format_clock};
