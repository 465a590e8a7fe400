//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::events::{
    BroadcasterConfig, SnapshotPolicy, DEFAULT_QUEUE_CAPACITY, DEFAULT_SOURCE_CAPACITY,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8284
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Initial state sent to new subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// The most recently published event, `{}` before the first one
    LastEvent,
    /// JSON `null`
    Default,
}

impl SnapshotMode {
    /// Build the broadcaster policy for this mode
    pub fn policy(&self) -> SnapshotPolicy<Value> {
        match self {
            SnapshotMode::LastEvent => SnapshotPolicy::Seeded(json!({})),
            SnapshotMode::Default => SnapshotPolicy::Default,
        }
    }
}

impl std::str::FromStr for SnapshotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_event" => Ok(SnapshotMode::LastEvent),
            "default" => Ok(SnapshotMode::Default),
            other => Err(format!("unknown snapshot mode: {}", other)),
        }
    }
}

/// Broadcaster configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Events a subscriber may have queued before it is dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Events the publish route may have queued for the broadcaster
    #[serde(default = "default_source_capacity")]
    pub source_capacity: usize,

    #[serde(default = "default_snapshot")]
    pub snapshot: SnapshotMode,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_source_capacity() -> usize {
    DEFAULT_SOURCE_CAPACITY
}

fn default_snapshot() -> SnapshotMode {
    SnapshotMode::LastEvent
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            source_capacity: default_source_capacity(),
            snapshot: default_snapshot(),
        }
    }
}

impl EventsConfig {
    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            queue_capacity: self.queue_capacity,
            source_capacity: self.source_capacity,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// First config file found in the default locations
    pub fn default_path() -> Option<PathBuf> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("eventcast").join("config.toml")),
            Some(PathBuf::from("/etc/eventcast/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        config_paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Load from the default location if there is one, else environment only
    pub fn load_default() -> Result<(Self, Option<PathBuf>), ConfigError> {
        match Self::default_path() {
            Some(path) => Ok((Self::load_with_env(&path)?, Some(path))),
            None => Ok((Self::from_env(), None)),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = var("EVENTCAST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("EVENTCAST_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        // Broadcaster overrides
        if let Some(capacity) = var("EVENTCAST_QUEUE_CAPACITY").and_then(|c| c.parse().ok()) {
            self.events.queue_capacity = capacity;
        }
        if let Some(capacity) = var("EVENTCAST_SOURCE_CAPACITY").and_then(|c| c.parse().ok()) {
            self.events.source_capacity = capacity;
        }
        if let Some(mode) = var("EVENTCAST_SNAPSHOT") {
            match mode.parse() {
                Ok(mode) => self.events.snapshot = mode,
                Err(e) => tracing::warn!("Ignoring EVENTCAST_SNAPSHOT: {}", e),
            }
        }

        // Logging overrides
        if let Some(level) = var("EVENTCAST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("EVENTCAST_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Eventcast Configuration
#
# Environment variables override these settings:
# - EVENTCAST_HOST
# - EVENTCAST_PORT
# - EVENTCAST_QUEUE_CAPACITY
# - EVENTCAST_SOURCE_CAPACITY
# - EVENTCAST_SNAPSHOT
# - EVENTCAST_LOG_LEVEL
# - EVENTCAST_LOG_FORMAT

[server]
host = "0.0.0.0"
port = 8284

# Allowed CORS origins (empty allows any)
cors_origins = []

[events]
# Events a subscriber may fall behind by before it is disconnected
queue_capacity = 100

# Events waiting to be broadcast before publishers are made to wait
source_capacity = 1024

# Initial state for new subscribers: "last_event" ({} until the first
# event is published) or "default" (null)
snapshot = "last_event"

[logging]
# Log level (trace, debug, info, warn, error)
level = "info"

# Log format (pretty, json)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "0.0.0.0:8284");
        assert_eq!(config.events.queue_capacity, 100);
        assert_eq!(config.events.snapshot, SnapshotMode::LastEvent);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 8284);
        assert_eq!(config.events.queue_capacity, 100);
        assert_eq!(config.events.source_capacity, 1024);
        assert_eq!(config.events.snapshot, SnapshotMode::LastEvent);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[events]\nqueue_capacity = 8\nsnapshot = \"default\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.events.queue_capacity, 8);
        assert_eq!(config.events.snapshot, SnapshotMode::Default);
        assert_eq!(config.server.port, 8284);

        let broadcaster = config.events.broadcaster_config();
        assert_eq!(broadcaster.queue_capacity, 8);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a port\"").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/eventcast.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("EVENTCAST_PORT", "9000"),
            ("EVENTCAST_QUEUE_CAPACITY", "5"),
            ("EVENTCAST_SNAPSHOT", "default"),
            ("EVENTCAST_LOG_FORMAT", "json"),
            ("EVENTCAST_SOURCE_CAPACITY", "lots"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.events.queue_capacity, 5);
        assert_eq!(config.events.source_capacity, 1024);
        assert_eq!(config.events.snapshot, SnapshotMode::Default);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_last_event_mode_starts_empty() {
        let policy = SnapshotMode::LastEvent.policy();
        assert!(matches!(policy, SnapshotPolicy::Seeded(ref initial) if *initial == json!({})));
        assert!(matches!(SnapshotMode::Default.policy(), SnapshotPolicy::Default));
    }

    #[test]
    fn test_snapshot_mode_parse() {
        assert_eq!("last_event".parse::<SnapshotMode>(), Ok(SnapshotMode::LastEvent));
        assert_eq!("default".parse::<SnapshotMode>(), Ok(SnapshotMode::Default));
        assert!("latest".parse::<SnapshotMode>().is_err());
    }
}
