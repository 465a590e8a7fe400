//! WebSocket Event Streaming
//!
//! Streams application state to dashboard clients via WebSocket.
//!
//! ## Architecture
//!
//! - **Adapter**: sends a subscriber's snapshot, then its live events, to any
//!   sink of text frames
//! - **Handler**: handles the WebSocket upgrade and binds a socket to the
//!   adapter
//!
//! ## Wire format
//!
//! Every message is one standalone JSON document with no envelope. The first
//! message after connecting is the current state; each following message is
//! one published event, in publish order. When the server drops a client
//! (it fell too far behind, or the server is stopping) the socket closes;
//! clients reconnect to resume from a fresh snapshot.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8284/events');
//!
//! ws.onmessage = (event) => {
//!   const value = JSON.parse(event.data);
//!   console.log('Received:', value);
//! };
//! ```

mod adapter;
mod handler;

pub use adapter::{stream_events, TransportError};
pub use handler::websocket_handler;
