//! Broadcaster
//!
//! A single control-loop task owns the [`ClientRegistry`] and is the only
//! place it is ever touched. Callers talk to the loop purely by message
//! passing:
//!
//! - the producer sends events into the event source the loop was built with
//! - [`Broadcaster::subscribe`] sends a register message and waits for it to
//!   be accepted
//! - [`Broadcaster::stop`] sends an unregister message and waits likewise
//!
//! Messages are handled one at a time, so every registry mutation and every
//! delivery decision happens in one well-defined total order. Delivery uses a
//! non-blocking enqueue per subscriber; a subscriber whose queue is full is
//! dropped rather than waited on, so neither the producer nor any other
//! subscriber can be stalled by a slow reader.
//!
//! When the event source closes the loop closes every remaining queue and
//! exits. From then on subscribe/stop return [`EventsError::BroadcasterClosed`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};

use super::error::{EventsError, EventsResult};
use super::registry::{ClientRegistry, SubscriptionHandle};
use super::subscriber::Subscriber;

/// Default capacity of each subscriber queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default capacity of the event source created by [`Broadcaster::spawn`]
pub const DEFAULT_SOURCE_CAPACITY: usize = 1024;

const CONTROL_CAPACITY: usize = 64;

/// Clamp a channel capacity into the range tokio accepts
fn channel_capacity(requested: usize) -> usize {
    let capacity = requested.clamp(1, Semaphore::MAX_PERMITS);
    if capacity != requested {
        tracing::warn!(requested, capacity, "Channel capacity out of range, clamped");
    }
    capacity
}

/// Broadcaster tuning
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Events a subscriber may have queued before it is dropped
    pub queue_capacity: usize,
    /// Capacity of the event source channel created by [`Broadcaster::spawn`]
    pub source_capacity: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            source_capacity: DEFAULT_SOURCE_CAPACITY,
        }
    }
}

/// Function producing the current application state on demand
pub type StateProvider<E> = Arc<dyn Fn() -> E + Send + Sync>;

/// How a new subscriber's initial snapshot is produced
pub enum SnapshotPolicy<E> {
    /// Always `E::default()`
    Default,
    /// The last event published before the subscriber was registered
    ///
    /// The loop captures it in the same step that registers the queue, so
    /// the snapshot is followed by exactly the events published after it.
    LastEvent,
    /// Like [`SnapshotPolicy::LastEvent`], starting from the given state
    /// until the first event is published
    Seeded(E),
    /// Ask the application
    ///
    /// The provider runs after registration has been accepted. An event
    /// racing the subscribe call may show up both in the snapshot and on the
    /// live stream, but is never missed.
    Provider(StateProvider<E>),
}

impl<E> SnapshotPolicy<E> {
    /// Build a provider policy from a closure
    pub fn provider<F>(f: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        SnapshotPolicy::Provider(Arc::new(f))
    }

    fn tracks_last_event(&self) -> bool {
        matches!(self, SnapshotPolicy::LastEvent | SnapshotPolicy::Seeded(_))
    }
}

impl<E: Clone> SnapshotPolicy<E> {
    fn initial_state(&self) -> Option<E> {
        match self {
            SnapshotPolicy::Seeded(initial) => Some(initial.clone()),
            _ => None,
        }
    }
}

impl<E: Clone> Clone for SnapshotPolicy<E> {
    fn clone(&self) -> Self {
        match self {
            SnapshotPolicy::Default => SnapshotPolicy::Default,
            SnapshotPolicy::LastEvent => SnapshotPolicy::LastEvent,
            SnapshotPolicy::Seeded(initial) => SnapshotPolicy::Seeded(initial.clone()),
            SnapshotPolicy::Provider(f) => SnapshotPolicy::Provider(Arc::clone(f)),
        }
    }
}

impl<E> fmt::Debug for SnapshotPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotPolicy::Default => f.write_str("Default"),
            SnapshotPolicy::LastEvent => f.write_str("LastEvent"),
            SnapshotPolicy::Seeded(_) => f.write_str("Seeded(..)"),
            SnapshotPolicy::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Counters kept by the control loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcasterStats {
    /// Currently registered subscribers
    pub subscribers: usize,
    /// Events received from the source and fanned out
    pub events_published: u64,
    /// Subscribers removed by the loop (fell behind or went away)
    pub subscribers_dropped: u64,
}

struct Registered<E> {
    handle: SubscriptionHandle,
    last_event: Option<E>,
}

enum Command<E> {
    Register {
        sender: mpsc::Sender<E>,
        reply: oneshot::Sender<Registered<E>>,
    },
    Unregister {
        handle: SubscriptionHandle,
        reply: oneshot::Sender<()>,
    },
    LastEvent {
        reply: oneshot::Sender<Option<E>>,
    },
    Stats {
        reply: oneshot::Sender<BroadcasterStats>,
    },
}

/// Fan-out coordinator for application events
///
/// Cloning is cheap; every clone talks to the same control loop.
pub struct Broadcaster<E> {
    commands: mpsc::Sender<Command<E>>,
    policy: SnapshotPolicy<E>,
    queue_capacity: usize,
}

impl<E: Clone> Clone for Broadcaster<E> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            policy: self.policy.clone(),
            queue_capacity: self.queue_capacity,
        }
    }
}

impl<E> fmt::Debug for Broadcaster<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("policy", &self.policy)
            .field("queue_capacity", &self.queue_capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<E> Broadcaster<E>
where
    E: Clone + Default + Send + 'static,
{
    /// Start broadcasting events received from `source`
    ///
    /// Spawns the control loop on the current tokio runtime. The loop runs
    /// until every sender of `source` has been dropped.
    pub fn new(
        source: mpsc::Receiver<E>,
        policy: SnapshotPolicy<E>,
        config: BroadcasterConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(CONTROL_CAPACITY);

        let control = ControlLoop {
            source,
            commands: commands_rx,
            clients: ClientRegistry::new(),
            track_last_event: policy.tracks_last_event(),
            last_event: policy.initial_state(),
            next_handle: 1,
            events_published: 0,
            subscribers_dropped: 0,
        };
        tokio::spawn(control.run());

        Self {
            commands: commands_tx,
            policy,
            queue_capacity: channel_capacity(config.queue_capacity),
        }
    }

    /// Create an event source and a broadcaster reading from it
    ///
    /// Returns the producer's sender; dropping every clone of it shuts the
    /// broadcaster down.
    pub fn spawn(policy: SnapshotPolicy<E>, config: BroadcasterConfig) -> (mpsc::Sender<E>, Self) {
        let (tx, rx) = mpsc::channel(channel_capacity(config.source_capacity));
        (tx, Self::new(rx, policy, config))
    }

    /// Join the live event stream
    ///
    /// Returns the current state snapshot and the subscriber's queue. The
    /// queue receives every event published after registration was accepted,
    /// unless the subscriber falls behind and is dropped.
    pub async fn subscribe(&self) -> EventsResult<(E, Subscriber<E>)> {
        self.subscribe_with_capacity(self.queue_capacity).await
    }

    pub(crate) async fn subscribe_with_capacity(
        &self,
        capacity: usize,
    ) -> EventsResult<(E, Subscriber<E>)> {
        let (sender, receiver) = mpsc::channel(channel_capacity(capacity));
        let (reply, registered) = oneshot::channel();

        self.commands
            .send(Command::Register { sender, reply })
            .await
            .map_err(|_| EventsError::BroadcasterClosed)?;
        let registered = registered.await.map_err(|_| EventsError::BroadcasterClosed)?;

        let snapshot = match &self.policy {
            SnapshotPolicy::Default => E::default(),
            SnapshotPolicy::LastEvent | SnapshotPolicy::Seeded(_) => {
                registered.last_event.unwrap_or_default()
            }
            SnapshotPolicy::Provider(provider) => provider(),
        };

        Ok((snapshot, Subscriber::new(registered.handle, receiver)))
    }

    /// Leave the live event stream
    ///
    /// Idempotent: stopping a handle the loop already dropped is a no-op.
    /// Once this returns no further events are queued for the handle.
    pub async fn stop(&self, handle: SubscriptionHandle) -> EventsResult<()> {
        let (reply, done) = oneshot::channel();

        self.commands
            .send(Command::Unregister { handle, reply })
            .await
            .map_err(|_| EventsError::BroadcasterClosed)?;
        done.await.map_err(|_| EventsError::BroadcasterClosed)
    }

    /// Current state, produced the same way as a subscriber's snapshot
    pub async fn snapshot(&self) -> EventsResult<E> {
        match &self.policy {
            SnapshotPolicy::LastEvent | SnapshotPolicy::Seeded(_) => {
                let (reply, last_event) = oneshot::channel();
                self.commands
                    .send(Command::LastEvent { reply })
                    .await
                    .map_err(|_| EventsError::BroadcasterClosed)?;
                let last_event = last_event
                    .await
                    .map_err(|_| EventsError::BroadcasterClosed)?;
                Ok(last_event.unwrap_or_default())
            }
            _ if self.is_closed() => Err(EventsError::BroadcasterClosed),
            SnapshotPolicy::Default => Ok(E::default()),
            SnapshotPolicy::Provider(provider) => Ok(provider()),
        }
    }

    /// Counters from the control loop
    pub async fn stats(&self) -> EventsResult<BroadcasterStats> {
        let (reply, stats) = oneshot::channel();

        self.commands
            .send(Command::Stats { reply })
            .await
            .map_err(|_| EventsError::BroadcasterClosed)?;
        stats.await.map_err(|_| EventsError::BroadcasterClosed)
    }
}

impl<E> Broadcaster<E> {
    /// Whether the control loop has exited
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Wait for the control loop to exit
    pub async fn closed(&self) {
        self.commands.closed().await
    }
}

/// State owned by the control-loop task
struct ControlLoop<E> {
    source: mpsc::Receiver<E>,
    commands: mpsc::Receiver<Command<E>>,
    clients: ClientRegistry<E>,
    track_last_event: bool,
    last_event: Option<E>,
    next_handle: u64,
    events_published: u64,
    subscribers_dropped: u64,
}

impl<E: Clone> ControlLoop<E> {
    async fn run(mut self) {
        tracing::debug!("Broadcaster started");

        loop {
            // Control messages first, so subscribe/stop never queue behind
            // more than the event currently being fanned out
            tokio::select! {
                biased;

                Some(command) = self.commands.recv() => self.handle_command(command),

                event = self.source.recv() => match event {
                    Some(event) => self.publish(event),
                    None => break,
                },
            }
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command<E>) {
        match command {
            Command::Register { sender, reply } => {
                let handle = SubscriptionHandle::new(self.next_handle);
                self.next_handle += 1;
                self.clients.register(handle, sender);

                tracing::debug!(
                    subscriber = %handle,
                    subscribers = self.clients.len(),
                    "Subscriber registered"
                );

                let registered = Registered {
                    handle,
                    last_event: self.last_event.clone(),
                };
                if reply.send(registered).is_err() {
                    // Caller gave up while waiting; nobody holds the reader
                    self.clients.unregister(handle);
                }
            }
            Command::Unregister { handle, reply } => {
                if self.clients.unregister(handle) {
                    tracing::debug!(
                        subscriber = %handle,
                        subscribers = self.clients.len(),
                        "Subscriber unregistered"
                    );
                }
                let _ = reply.send(());
            }
            Command::LastEvent { reply } => {
                let _ = reply.send(self.last_event.clone());
            }
            Command::Stats { reply } => {
                let _ = reply.send(BroadcasterStats {
                    subscribers: self.clients.len(),
                    events_published: self.events_published,
                    subscribers_dropped: self.subscribers_dropped,
                });
            }
        }
    }

    fn publish(&mut self, event: E) {
        self.events_published += 1;

        if !self.clients.is_empty() {
            let report = self.clients.publish(&event);
            self.subscribers_dropped += report.dropped() as u64;

            tracing::trace!(
                delivered = report.delivered,
                dropped = report.dropped(),
                "Published event"
            );
        }

        if self.track_last_event {
            self.last_event = Some(event);
        }
    }

    fn shutdown(&mut self) {
        let closed = self.clients.close();

        // Refuse new messages, then drop anything already queued so that
        // waiting callers see the broadcaster as closed
        self.commands.close();
        while self.commands.try_recv().is_ok() {}

        tracing::info!(
            subscribers_closed = closed,
            events_published = self.events_published,
            "Event source closed, broadcaster stopped"
        );
    }
}
