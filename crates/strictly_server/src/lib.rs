//! Strictly Checkers server library
//!
//! The authoritative side of a two-player checkers game: a registry of
//! sessions, per-session clock tickers and snapshot broadcast, and an axum
//! router exposing them over REST and server-sent events.
//!
//! # Architecture
//!
//! - **Manager**: [`SessionManager`] owns every session behind its own lock
//! - **Hub**: per-session broadcast of snapshots in production order
//! - **Ticker**: per-session task charging the clock of the side to move
//! - **API**: [`router`] maps HTTP requests onto manager operations
//!
//! # Example
//!
//! ```no_run
//! use strictly_server::{ServerConfig, SessionManager, serve};
//!
//! # async fn example() -> std::io::Result<()> {
//! let config = ServerConfig::default();
//! let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//! serve(listener, SessionManager::new(config), std::future::pending()).await
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod config;
mod hub;
mod manager;
mod ticker;

pub use api::{ApiError, router, status_for};
pub use config::{ConfigError, ServerConfig};
pub use manager::{SessionManager, Subscription};

use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Serves the API on `listener` until `shutdown` resolves.
///
/// Terminal sessions are evicted once their retention window has passed.
/// On shutdown every session is dropped first, which ends the open
/// snapshot streams so in-flight connections can drain.
pub async fn serve(
    listener: TcpListener,
    manager: SessionManager,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Server ready");

    manager.start_eviction();
    let app = router(manager.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested");
            manager.shutdown();
        })
        .await
}
