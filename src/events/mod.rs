//! Event Broadcasting
//!
//! Fans application state-change events out to a changing set of long-lived
//! subscribers without ever letting one subscriber hold up the producer or
//! anyone else.
//!
//! ## Architecture
//!
//! - **Broadcaster**: control-loop task owning the subscriber registry, plus
//!   the cloneable handle used to subscribe and stop
//! - **ClientRegistry**: subscriber queues, touched only by the control loop
//! - **Subscriber**: the reading end of one bounded queue
//!
//! ## Delivery contract
//!
//! - Events reach each subscriber in publish order, without duplicates
//! - A subscriber whose queue is full at publish time is dropped; it sees the
//!   end of its stream and must subscribe again to resume
//! - Closing the event source closes every subscriber and the broadcaster
//!
//! ## Example
//!
//! ```rust,no_run
//! use eventcast::events::{Broadcaster, BroadcasterConfig, SnapshotPolicy};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (publisher, broadcaster) =
//!     Broadcaster::<u64>::spawn(SnapshotPolicy::LastEvent, BroadcasterConfig::default());
//!
//! let (snapshot, mut subscriber) = broadcaster.subscribe().await?;
//! println!("state: {}", snapshot);
//!
//! publisher.send(42).await?;
//! while let Some(event) = subscriber.recv().await {
//!     println!("event: {}", event);
//! }
//! # Ok(())
//! # }
//! ```

mod broadcaster;
mod error;
mod registry;
mod subscriber;

pub use broadcaster::{
    Broadcaster, BroadcasterConfig, BroadcasterStats, SnapshotPolicy, StateProvider,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SOURCE_CAPACITY,
};
pub use error::{EventsError, EventsResult};
pub use registry::{Delivery, SubscriptionHandle};
pub use subscriber::Subscriber;
