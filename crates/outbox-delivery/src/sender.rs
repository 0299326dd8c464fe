//! Effect sender: one delivery attempt per invocation.
//!
//! Invokes the external effect executor for the queue head action and
//! reports the outcome back into the engine as an event. The sender never
//! errors and never decides retry or commit; every executor failure
//! becomes a `Failure` outcome for the result processor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use outbox_core::{Clock, EffectError, EventSink, OfflineAction, OutboxEvent, SendOutcome};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::EngineEvent;

/// External executor that actually performs the effect.
///
/// The descriptor is the action's opaque `meta.effect`, passed verbatim.
/// Implementations typically perform network I/O; the engine only requires
/// that failures come back as [`EffectError`] rather than panics.
#[async_trait::async_trait]
pub trait EffectExecutor: Send + Sync + std::fmt::Debug {
    /// Performs the effect once, returning an optional result payload.
    async fn execute(
        &self,
        effect: &Value,
        action: &OfflineAction,
    ) -> std::result::Result<Option<Value>, EffectError>;
}

/// Performs single send attempts and feeds outcomes back into the engine.
#[derive(Debug)]
pub struct EffectSender {
    executor: Arc<dyn EffectExecutor>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    results: mpsc::UnboundedSender<EngineEvent>,
}

impl EffectSender {
    /// Creates a sender wired to the engine's inbound event channel.
    pub fn new(
        executor: Arc<dyn EffectExecutor>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        results: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self { executor, sink, clock, results }
    }

    /// Performs one attempt for the given action.
    ///
    /// Emits `SendStarted`, then runs the executor off the event loop; its
    /// eventual outcome re-enters the engine as a `SendResult` event. The
    /// sender does not own the `busy` flag; clearing it belongs to the
    /// result-processing path.
    pub async fn send(&self, action: OfflineAction, retry_count: u32) {
        let attempt = retry_count + 1;
        debug!(kind = %action.kind, attempt, "send started");
        self.sink
            .handle(OutboxEvent::SendStarted {
                action: action.clone(),
                attempt,
                started_at: DateTime::<Utc>::from(self.clock.now_system()),
            })
            .await;

        let executor = self.executor.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let outcome = match executor.execute(&action.meta.effect, &action).await {
                Ok(payload) => SendOutcome::Success(payload),
                Err(error) => SendOutcome::Failure(error),
            };
            if results.send(EngineEvent::SendResult { action, outcome }).is_err() {
                debug!("engine stopped before send result was delivered");
            }
        });
    }
}
