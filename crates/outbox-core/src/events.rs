//! Lifecycle event stream for decoupled observation of delivery.
//!
//! Defines the events the engine emits as actions move through the
//! pipeline and the sink traits collaborators implement to observe them.
//! Sinks never fail back into the engine; event handling must not
//! interfere with delivery processing.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::EffectError,
    models::{CompletedAction, OfflineAction},
};

/// Events emitted by the delivery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboxEvent {
    /// A send attempt for the queue head action began.
    SendStarted {
        /// Action being sent.
        action: OfflineAction,
        /// Attempt number for this action (1-based).
        attempt: u32,
        /// When the attempt started.
        started_at: DateTime<Utc>,
    },

    /// A send attempt finished and its outcome entered result processing.
    SendResult {
        /// Action that was sent.
        action: OfflineAction,
        /// Whether the executor reported success.
        success: bool,
        /// Executor failure, when unsuccessful.
        error: Option<EffectError>,
    },

    /// A backoff timer was armed for the queue head action.
    RetryScheduled {
        /// Delay until the next attempt.
        delay: Duration,
        /// Failed attempts of the head action so far.
        retry_count: u32,
    },

    /// A backoff timer elapsed; the head may be sent again.
    RetryCompleted,

    /// Terminal commit action for a delivered offline action.
    Committed(CompletedAction),

    /// Terminal rollback action for a permanently failed offline action.
    RolledBack(CompletedAction),
}

/// Trait for observing delivery lifecycle events.
///
/// The engine calls `handle` as actions progress. Implementations must not
/// block delivery processing; failures should be logged by the sink itself
/// and never propagated back.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Handles one lifecycle event.
    async fn handle(&self, event: OutboxEvent);
}

/// Sink that discards all events.
#[derive(Debug, Default)]
pub struct NoOpSink;

impl NoOpSink {
    /// Creates a new no-op sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl EventSink for NoOpSink {
    async fn handle(&self, _event: OutboxEvent) {}
}

/// Sink that fans events out to multiple subscribers concurrently.
#[derive(Debug, Clone, Default)]
pub struct MulticastSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MulticastSink {
    /// Creates a multicast sink with no subscribers.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Adds a subscriber to receive lifecycle events.
    pub fn add_subscriber(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }
}

#[async_trait::async_trait]
impl EventSink for MulticastSink {
    async fn handle(&self, event: OutboxEvent) {
        let dispatch = self.sinks.iter().map(|sink| {
            let event = event.clone();
            async move {
                sink.handle(event).await;
            }
        });

        futures::future::join_all(dispatch).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    struct CountingSink {
        seen: Arc<AtomicUsize>,
    }

    impl CountingSink {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let counter = Arc::new(AtomicUsize::new(0));
            (Self { seen: counter.clone() }, counter)
        }
    }

    #[async_trait::async_trait]
    impl EventSink for CountingSink {
        async fn handle(&self, _event: OutboxEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_event() -> OutboxEvent {
        OutboxEvent::SendStarted {
            action: OfflineAction::new("ping", json!({"url": "/ping"})),
            attempt: 1,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn no_op_sink_discards_events() {
        NoOpSink::new().handle(sample_event()).await;
    }

    #[tokio::test]
    async fn multicast_sink_forwards_to_all_subscribers() {
        let mut multicast = MulticastSink::new();
        let (first, first_count) = CountingSink::new();
        let (second, second_count) = CountingSink::new();

        multicast.add_subscriber(Arc::new(first));
        multicast.add_subscriber(Arc::new(second));
        assert_eq!(multicast.subscriber_count(), 2);

        multicast.handle(sample_event()).await;

        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn multicast_sink_tolerates_empty_subscribers() {
        MulticastSink::new().handle(sample_event()).await;
    }
}
