//! Data Transfer Objects
//!
//! Response types for the API endpoints.

use serde::Serialize;

/// Publish response
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    /// Status: "accepted"
    pub status: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "stopped"
    pub status: String,
    /// Currently connected subscribers
    pub subscribers: usize,
    /// Events broadcast since startup
    pub events_published: u64,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}
