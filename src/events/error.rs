//! Broadcaster error types
//!
//! Only one failure ever leaves the control loop: using a broadcaster whose
//! event source has closed. Slow or disconnected subscribers are handled
//! inside the loop and never reported to callers.

use thiserror::Error;

/// Errors returned by the subscribe/stop API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventsError {
    /// The control loop has exited because its event source closed
    #[error("Broadcaster closed")]
    BroadcasterClosed,
}

/// Result type alias for broadcaster operations
pub type EventsResult<T> = Result<T, EventsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EventsError::BroadcasterClosed;
        assert_eq!(err.to_string(), "Broadcaster closed");
    }
}
