//! Subscriber side of a registered queue

use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::registry::SubscriptionHandle;

/// The reading end of one subscriber queue
///
/// Yields events in publish order until the broadcaster closes the queue,
/// either because this subscriber fell behind, because [`stop`] was called
/// for its handle, or because the broadcaster shut down.
///
/// Dropping a `Subscriber` without calling [`stop`] is allowed; the
/// broadcaster notices on the next publish and forgets the queue.
///
/// [`stop`]: super::Broadcaster::stop
#[derive(Debug)]
pub struct Subscriber<E> {
    handle: SubscriptionHandle,
    receiver: mpsc::Receiver<E>,
}

impl<E> Subscriber<E> {
    pub(crate) fn new(handle: SubscriptionHandle, receiver: mpsc::Receiver<E>) -> Self {
        Self { handle, receiver }
    }

    /// Handle used to request removal from the broadcaster
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the queue has been closed and drained.
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }
}

impl<E> Stream for Subscriber<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.receiver.poll_recv(cx)
    }
}
