//! Queue abstraction over pending offline actions.
//!
//! The engine only ever peeks at the head and dequeues on terminal
//! resolution; enqueue ordering and persistence belong to the
//! implementation. [`InMemoryQueue`] is the in-crate reference
//! implementation; durable queues are supplied by the embedding
//! application.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use outbox_core::OfflineAction;

/// FIFO storage of pending offline actions.
///
/// An action stays at the head while awaiting retry and leaves the queue
/// only once terminally resolved.
pub trait OutboxQueue: Send + Sync + std::fmt::Debug + 'static {
    /// Non-destructive head lookup.
    fn peek(&self) -> Option<OfflineAction>;

    /// Appends an action to the tail.
    fn enqueue(&self, action: OfflineAction);

    /// Removes and returns the head action.
    fn dequeue(&self) -> Option<OfflineAction>;

    /// Number of pending actions.
    fn len(&self) -> usize;

    /// Whether the queue holds no pending actions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory FIFO queue.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    items: Mutex<VecDeque<OfflineAction>>,
}

impl InMemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutboxQueue for InMemoryQueue {
    fn peek(&self) -> Option<OfflineAction> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).front().cloned()
    }

    fn enqueue(&self, action: OfflineAction) {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).push_back(action);
    }

    fn dequeue(&self) -> Option<OfflineAction> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
