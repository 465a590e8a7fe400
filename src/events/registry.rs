//! Client Registry
//!
//! The set of subscriber queues currently receiving events. The registry is
//! owned by the broadcaster's control loop and never shared, which is what
//! lets register, unregister and publish interleave without locks.
//!
//! The registry holds the only sending half of each queue, so removing an
//! entry closes that queue: its reader drains whatever is buffered and then
//! observes end-of-stream.

use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifies one subscriber queue
///
/// Handles are allocated by the control loop and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric id of this handle
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of a non-blocking enqueue into one subscriber queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event was queued for the subscriber
    Enqueued,
    /// The queue was at capacity; the subscriber has fallen behind
    Full,
    /// The subscriber dropped its end of the queue without unregistering
    Disconnected,
}

/// Counts from one fan-out pass over the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PublishReport {
    /// Subscribers the event was queued for
    pub delivered: usize,
    /// Subscribers removed because their queue was full
    pub lagging: usize,
    /// Subscribers removed because their reader was gone
    pub disconnected: usize,
}

impl PublishReport {
    /// Total subscribers removed during the pass
    pub(crate) fn dropped(&self) -> usize {
        self.lagging + self.disconnected
    }
}

/// Registered subscriber queues, keyed by handle
pub(crate) struct ClientRegistry<E> {
    clients: HashMap<SubscriptionHandle, mpsc::Sender<E>>,
}

impl<E: Clone> ClientRegistry<E> {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Add a queue; returns false if the handle was already registered
    pub fn register(&mut self, handle: SubscriptionHandle, sender: mpsc::Sender<E>) -> bool {
        if self.contains(handle) {
            return false;
        }
        self.clients.insert(handle, sender);
        true
    }

    /// Remove a queue on behalf of its subscriber
    ///
    /// The queue may already have been dropped by the loop, in which case
    /// this is a no-op and returns false.
    pub fn unregister(&mut self, handle: SubscriptionHandle) -> bool {
        self.clients.remove(&handle).is_some()
    }

    /// Fan an event out to every registered queue
    ///
    /// Queues that cannot accept the event immediately are removed, which
    /// closes them. Nothing here ever waits on a subscriber.
    pub fn publish(&mut self, event: &E) -> PublishReport {
        let mut report = PublishReport::default();

        self.clients
            .retain(|handle, sender| match try_deliver(sender, event.clone()) {
                Delivery::Enqueued => {
                    report.delivered += 1;
                    true
                }
                Delivery::Full => {
                    tracing::warn!(subscriber = %handle, "Subscriber fell behind, dropping");
                    report.lagging += 1;
                    false
                }
                Delivery::Disconnected => {
                    tracing::debug!(subscriber = %handle, "Subscriber went away without stopping");
                    report.disconnected += 1;
                    false
                }
            });

        report
    }

    /// Close and remove every queue, returning how many were closed
    pub fn close(&mut self) -> usize {
        let count = self.clients.len();
        self.clients.clear();
        count
    }

    pub fn contains(&self, handle: SubscriptionHandle) -> bool {
        self.clients.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn try_deliver<E>(sender: &mpsc::Sender<E>, event: E) -> Delivery {
    match sender.try_send(event) {
        Ok(()) => Delivery::Enqueued,
        Err(TrySendError::Full(_)) => Delivery::Full,
        Err(TrySendError::Closed(_)) => Delivery::Disconnected,
    }
}
