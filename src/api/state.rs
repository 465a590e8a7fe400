//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use serde_json::Value;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::config::{Config, ServerConfig};
use crate::events::Broadcaster;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Producer end of the broadcaster's event source
    pub publisher: mpsc::Sender<Value>,
    /// Broadcaster fanning events out to WebSocket subscribers
    pub broadcaster: Broadcaster<Value>,
    /// Server configuration
    pub server: ServerConfig,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state around an existing publisher and broadcaster
    pub fn new(
        publisher: mpsc::Sender<Value>,
        broadcaster: Broadcaster<Value>,
        server: ServerConfig,
    ) -> Self {
        Self {
            publisher,
            broadcaster,
            server,
            start_time: Instant::now(),
        }
    }

    /// Start a broadcaster as described by `config`
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let policy = config.events.snapshot.policy();
        let (publisher, broadcaster) =
            Broadcaster::spawn(policy, config.events.broadcaster_config());

        Self::new(publisher, broadcaster, config.server.clone())
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
