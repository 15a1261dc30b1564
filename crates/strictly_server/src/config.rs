//! Server configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strictly_checkers::{CapturePolicy, Rules};
use tracing::{debug, info, instrument};

/// Configuration for the game server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    host: String,

    /// Port to bind to.
    port: u16,

    /// Seconds per side for new sessions that do not choose; 0 disables clocks.
    default_time_control_secs: u32,

    /// Whether captures are compulsory.
    capture_policy: CapturePolicy,

    /// Snapshots buffered per subscriber before it is considered lagging.
    broadcast_capacity: usize,

    /// Period of the clock ticker in milliseconds. Each tick charges one second.
    clock_tick_millis: u64,

    /// Seconds a finished or abandoned session stays readable before it is evicted.
    finished_retention_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            default_time_control_secs: 600,
            capture_policy: CapturePolicy::Mandatory,
            broadcast_capacity: 32,
            clock_tick_millis: 1000,
            finished_retention_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        info!(host = %config.host, port = config.port, "Config loaded successfully");
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
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::new("broadcast_capacity must be at least 1".to_string()));
        }
        if self.clock_tick_millis == 0 {
            return Err(ConfigError::new("clock_tick_millis must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Time control for new sessions, `None` when clocks are off.
    pub fn default_time_control(&self) -> Option<u32> {
        (self.default_time_control_secs > 0).then_some(self.default_time_control_secs)
    }

    /// How long terminal sessions are kept.
    pub fn finished_retention(&self) -> Duration {
        Duration::from_secs(self.finished_retention_secs)
    }

    /// Period of the eviction sweep: the retention window, between 1 and 60 seconds.
    pub fn eviction_period(&self) -> Duration {
        Duration::from_secs(self.finished_retention_secs.clamp(1, 60))
    }

    /// Rule set built from this configuration.
    pub fn rules(&self) -> Rules {
        Rules::new(self.capture_policy)
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
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
    fn missing_keys_take_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 4100\ncapture_policy = \"optional\"").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(*config.port(), 4100);
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.rules().capture_policy(), CapturePolicy::Optional);
        assert_eq!(config.default_time_control(), Some(600));
    }

    #[test]
    fn zero_time_control_disables_clocks() {
        let config = ServerConfig::default().with_default_time_control_secs(0u32);
        assert_eq!(config.default_time_control(), None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "broadcast_capacity = 0").unwrap();
        let err = ServerConfig::from_file(file.path()).unwrap_err();
        assert!(err.message.contains("broadcast_capacity"));
        assert!(err.file.ends_with("config.rs"));
    }

    #[test]
    fn retention_window_bounds_the_sweep_period() {
        let config = ServerConfig::default();
        assert_eq!(config.finished_retention(), Duration::from_secs(300));
        assert_eq!(config.eviction_period(), Duration::from_secs(60));
        let config = config.with_finished_retention_secs(0u64);
        assert_eq!(config.eviction_period(), Duration::from_secs(1));
    }

    #[test]
    fn unreadable_file_reports_location() {
        let err = ServerConfig::from_file("/nonexistent/strictly.toml").unwrap_err();
        assert!(err.message.starts_with("Failed to read"));
    }
}
