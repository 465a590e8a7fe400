//! # Eventcast
//!
//! Application state broadcasting - fan live state-change events out to any
//! number of WebSocket subscribers, each starting from a fresh snapshot.
//!
//! ## Features
//!
//! - **Lock-free fan-out**: one control loop owns every subscriber queue
//! - **Slow consumers never stall anyone**: a subscriber that falls a full
//!   queue behind is disconnected instead of waited on
//! - **Snapshot on join**: new subscribers get the current state first
//! - **Real-time**: WebSocket streaming, one JSON document per message
//!
//! ## Modules
//!
//! - [`events`]: Broadcaster, subscriber queues and the subscribe/stop API
//! - [`websocket`]: Streams a subscriber to a WebSocket (or any sink)
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventcast::events::{Broadcaster, BroadcasterConfig, SnapshotPolicy};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (publisher, broadcaster) =
//!         Broadcaster::spawn(SnapshotPolicy::LastEvent, BroadcasterConfig::default());
//!
//!     publisher.send(json!({"door": "open"})).await?;
//!
//!     let (state, mut subscriber) = broadcaster.subscribe().await?;
//!     println!("Current state: {}", state);
//!
//!     publisher.send(json!({"door": "closed"})).await?;
//!     drop(publisher);
//!
//!     while let Some(event) = subscriber.recv().await {
//!         println!("Event: {}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod events;
pub mod websocket;

// Re-export top-level types for convenience
pub use events::{
    Broadcaster, BroadcasterConfig, BroadcasterStats, Delivery, EventsError, EventsResult,
    SnapshotPolicy, StateProvider, Subscriber, SubscriptionHandle,
};

pub use websocket::{stream_events, websocket_handler, TransportError};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{
    Config, ConfigError, EventsConfig, LoggingConfig, ServerConfig, SnapshotMode,
};
