//! Recording event sink for lifecycle assertions.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use outbox_core::{CompletedAction, EventSink, OutboxEvent};

/// Sink that records every lifecycle event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<OutboxEvent>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in emission order.
    pub fn events(&self) -> Vec<OutboxEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Terminal commit actions, in emission order.
    pub fn committed(&self) -> Vec<CompletedAction> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutboxEvent::Committed(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    /// Terminal rollback actions, in emission order.
    pub fn rolled_back(&self) -> Vec<CompletedAction> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutboxEvent::RolledBack(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    /// `(delay, retry_count)` pairs of every armed backoff timer.
    pub fn retries_scheduled(&self) -> Vec<(Duration, u32)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutboxEvent::RetryScheduled { delay, retry_count } => Some((delay, retry_count)),
                _ => None,
            })
            .collect()
    }

    /// Number of send attempts started.
    pub fn sends_started(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, OutboxEvent::SendStarted { .. }))
            .count()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingSink {
    async fn handle(&self, event: OutboxEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
