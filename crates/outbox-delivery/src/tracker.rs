//! Transaction tracker mapping ids to pending completion handles.
//!
//! Producers that enqueue a tracked action receive a handle they can
//! await from any task without driving the event loop. Settlement is
//! exactly-once: a second resolve/reject of the same id is logged and
//! ignored, never propagated. A late or duplicate completion must never
//! crash the caller.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use outbox_core::{EffectError, TransactionId};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Terminal outcome delivered to an awaiting producer.
///
/// `Ok` carries the executor payload from the commit path; `Err` carries
/// the failure that drove the rollback.
pub type TransactionResult = std::result::Result<Option<Value>, EffectError>;

/// Tracks pending transactions keyed by id.
#[derive(Debug, Default)]
pub struct TransactionTracker {
    pending: Mutex<HashMap<TransactionId, oneshot::Sender<TransactionResult>>>,
}

impl TransactionTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending transaction and returns the handle a producer
    /// awaits.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateTransaction`] if the id is already
    /// registered. Transaction ids are never reused.
    pub fn register(&self, id: TransactionId) -> Result<CompletionHandle> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.contains_key(&id) {
            return Err(EngineError::DuplicateTransaction(id));
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(id, tx);
        debug!(transaction = %id, "transaction registered");
        Ok(CompletionHandle { id, rx })
    }

    /// Settles a transaction as resolved, waking the awaiting producer.
    pub fn resolve(&self, id: TransactionId, payload: Option<Value>) {
        self.settle(id, Ok(payload));
    }

    /// Settles a transaction as rejected, waking the awaiting producer.
    pub fn reject(&self, id: TransactionId, error: EffectError) {
        self.settle(id, Err(error));
    }

    /// Rejects every still-pending transaction.
    ///
    /// Called on engine shutdown so producers never hang on a handle.
    pub fn reject_all(&self, error: EffectError) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.drain().collect()
        };
        for (id, tx) in drained {
            debug!(transaction = %id, "rejecting pending transaction on shutdown");
            let _ = tx.send(Err(error.clone()));
        }
    }

    /// Number of transactions still awaiting settlement.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn settle(&self, id: TransactionId, result: TransactionResult) {
        let entry = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.remove(&id)
        };
        match entry {
            Some(tx) => {
                if tx.send(result).is_err() {
                    debug!(transaction = %id, "producer dropped handle before settlement");
                }
            },
            None => {
                warn!(transaction = %id, "settling unknown or already-settled transaction, ignoring");
            },
        }
    }
}

/// Awaitable handle for one tracked transaction.
///
/// Settled exactly once when the corresponding action commits or rolls
/// back.
#[derive(Debug)]
pub struct CompletionHandle {
    id: TransactionId,
    rx: oneshot::Receiver<TransactionResult>,
}

impl CompletionHandle {
    /// Transaction id this handle is awaiting.
    pub fn transaction(&self) -> TransactionId {
        self.id
    }

    /// Waits for the terminal outcome of the tracked action.
    ///
    /// If the engine is dropped before settling, returns an internal
    /// error rather than hanging forever.
    pub async fn wait(self) -> TransactionResult {
        self.rx
            .await
            .unwrap_or_else(|_| Err(EffectError::internal("delivery engine dropped before settlement")))
    }
}
