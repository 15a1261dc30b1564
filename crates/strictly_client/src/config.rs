//! Client configuration.

use crate::sync::ReconnectPolicy;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strictly_checkers::{CapturePolicy, Rules};
use tracing::{debug, info, instrument};

/// Configuration for a participant client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the game server.
    server_url: String,

    /// Timeout for each REST request, in seconds.
    request_timeout_secs: u64,

    /// Capture policy used for destination hints and the `moves` listing;
    /// should match the server.
    capture_policy: CapturePolicy,

    /// Snapshot resubscription schedule.
    reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 10,
            capture_policy: CapturePolicy::Mandatory,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        info!(server_url = %config.server_url, "Config loaded successfully");
        Ok(config)
    }

    /// Loads from `path` when given, otherwise uses defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(ConfigError::new(format!(
                "server_url must be an http(s) URL, got {}",
                self.server_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::new("request_timeout_secs must be at least 1".to_string()));
        }
        if self.reconnect.initial_backoff_millis > self.reconnect.max_backoff_millis {
            return Err(ConfigError::new(
                "reconnect.initial_backoff_millis exceeds max_backoff_millis".to_string(),
            ));
        }
        Ok(())
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Rule set for destination hints.
    pub fn rules(&self) -> Rules {
        Rules::new(self.capture_policy)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reconnect_table_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server_url = \"http://game.local:8080\"\n\n[reconnect]\nmax_retries = 2"
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server_url(), "http://game.local:8080");
        assert_eq!(config.reconnect().max_retries, 2);
        assert_eq!(config.reconnect().initial_backoff_millis, 1000);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_non_http_url() {
        let config = ClientConfig::default().with_server_url("game.local:8080");
        let err = config.validate().unwrap_err();
        assert!(err.message.contains("http(s)"));
        assert!(err.file.ends_with("config.rs"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ClientConfig::from_file("/nonexistent/client.toml").unwrap_err();
        assert!(err.message.starts_with("Failed to read config file"));
    }
}
