//! Event Stream Adapter
//!
//! Forwards one subscriber's snapshot and live events to a remote sink,
//! one JSON document per message. The sink is any `futures` sink of text
//! frames, which keeps this loop independent of the socket library.

use futures_util::{Sink, SinkExt};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

use crate::events::{Broadcaster, EventsError, Subscriber};

/// Errors that end an event stream early
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not join the broadcaster
    #[error("Subscribe failed: {0}")]
    Subscribe(#[from] EventsError),

    /// The remote sink rejected a message
    #[error("Send failed: {0}")]
    Send(String),
}

/// Stream `snapshot` and then every event from `subscriber` into `sink`
///
/// Returns `Ok(())` when the broadcaster closes the subscriber's queue. In
/// that case the broadcaster has already forgotten the subscriber and
/// `stop` is not called.
///
/// If the sink fails the subscriber is stopped (best effort, the broadcaster
/// may already have dropped it or shut down) and the send error is returned.
pub async fn stream_events<E, S>(
    broadcaster: &Broadcaster<E>,
    snapshot: E,
    mut subscriber: Subscriber<E>,
    sink: &mut S,
) -> Result<(), TransportError>
where
    E: Serialize + Clone + Default + Send + 'static,
    S: Sink<String> + Unpin,
    S::Error: Display,
{
    let handle = subscriber.handle();

    if let Err(e) = send_json(sink, &snapshot).await {
        abandon(broadcaster, &subscriber).await;
        return Err(e);
    }

    while let Some(event) = subscriber.recv().await {
        if let Err(e) = send_json(sink, &event).await {
            abandon(broadcaster, &subscriber).await;
            return Err(e);
        }
    }

    tracing::debug!(subscriber = %handle, "Event stream closed by broadcaster");
    Ok(())
}

async fn send_json<T, S>(sink: &mut S, value: &T) -> Result<(), TransportError>
where
    T: Serialize,
    S: Sink<String> + Unpin,
    S::Error: Display,
{
    let text = match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize event, skipping");
            return Ok(());
        }
    };

    sink.send(text)
        .await
        .map_err(|e| TransportError::Send(e.to_string()))
}

async fn abandon<E>(broadcaster: &Broadcaster<E>, subscriber: &Subscriber<E>)
where
    E: Clone + Default + Send + 'static,
{
    let handle = subscriber.handle();
    match broadcaster.stop(handle).await {
        Ok(()) => tracing::debug!(subscriber = %handle, "Stopped subscriber after send failure"),
        Err(e) => tracing::debug!(subscriber = %handle, error = %e, "Stop after send failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BroadcasterConfig, SnapshotPolicy};
    use futures_util::sink;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_snapshot_then_events_until_closed() {
        let (tx, broadcaster) =
            Broadcaster::<Value>::spawn(SnapshotPolicy::LastEvent, BroadcasterConfig::default());
        tx.send(json!({"mode": "idle"})).await.unwrap();

        // Wait for the first event to become the state
        timeout(WAIT, async {
            while broadcaster.snapshot().await.unwrap() == Value::Null {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        let (snapshot, subscriber) = broadcaster.subscribe().await.unwrap();
        tx.send(json!({"mode": "running"})).await.unwrap();
        tx.send(json!(3)).await.unwrap();
        drop(tx);

        let mut frames: Vec<String> = Vec::new();
        let result = timeout(
            WAIT,
            stream_events(&broadcaster, snapshot, subscriber, &mut frames),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
        assert_eq!(
            frames,
            vec![
                r#"{"mode":"idle"}"#.to_string(),
                r#"{"mode":"running"}"#.to_string(),
                "3".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_failure_stops_subscriber() {
        let (tx, broadcaster) =
            Broadcaster::<u32>::spawn(SnapshotPolicy::Default, BroadcasterConfig::default());
        let (snapshot, subscriber) = broadcaster.subscribe().await.unwrap();

        // Accepts the snapshot and one event, then the peer is gone
        let mut failing = Box::pin(sink::unfold(0usize, |sent, _frame: String| async move {
            if sent >= 2 {
                Err("connection reset".to_string())
            } else {
                Ok(sent + 1)
            }
        }));

        for i in 0..5 {
            tx.send(i).await.unwrap();
        }

        let result = timeout(
            WAIT,
            stream_events(&broadcaster, snapshot, subscriber, &mut failing),
        )
        .await
        .unwrap();

        match result {
            Err(TransportError::Send(message)) => assert_eq!(message, "connection reset"),
            other => panic!("Expected send error, got {:?}", other),
        }
        assert_eq!(broadcaster.stats().await.unwrap().subscribers, 0);
    }

    #[tokio::test]
    async fn test_send_failure_after_shutdown() {
        let (tx, broadcaster) =
            Broadcaster::<u32>::spawn(SnapshotPolicy::Default, BroadcasterConfig::default());
        let (snapshot, subscriber) = broadcaster.subscribe().await.unwrap();
        drop(tx);
        timeout(WAIT, broadcaster.closed()).await.unwrap();

        let mut failing = Box::pin(sink::unfold((), |_, _frame: String| async move {
            Err::<(), _>("broken pipe".to_string())
        }));

        let result = stream_events(&broadcaster, snapshot, subscriber, &mut failing).await;
        assert!(matches!(result, Err(TransportError::Send(_))));
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::from(EventsError::BroadcasterClosed);
        assert_eq!(err.to_string(), "Subscribe failed: Broadcaster closed");

        let err = TransportError::Send("closed".to_string());
        assert_eq!(err.to_string(), "Send failed: closed");
    }
}
