//! Delivery coordinator: the orchestrating decision logic.
//!
//! A single event loop consumes inbound events (enqueues, send results,
//! retry expiries, connectivity changes, explicit flushes) and decides
//! whether to send the queue head. The explicit [`DeliveryState`] struct
//! is the only mutable state; `busy` prevents a second concurrent send and
//! `retry_scheduled` gates the single backoff timer. Executor calls and
//! timers run as spawned tasks whose completions re-enter the loop as
//! events, so no invocation ever blocks.

use std::sync::Arc;

use outbox_core::{
    Clock, DeliveryState, EffectError, EventSink, OfflineAction, OutboxEvent, SendOutcome,
};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{EngineError, Result},
    policy::{DecaySchedule, RetryPolicy},
    processor::{CommitHook, Disposition, ResultProcessor},
    queue::OutboxQueue,
    scheduler::RetryScheduler,
    sender::{EffectExecutor, EffectSender},
    tracker::{CompletionHandle, TransactionTracker},
};

/// Inbound events driving the coordinator.
///
/// Producers reach the loop through [`OutboxHandle`]; spawned executor
/// tasks and retry timers feed their completions back in directly.
#[derive(Debug)]
pub enum EngineEvent {
    /// A producer appended an action to the queue.
    Enqueued,

    /// A send attempt finished.
    SendResult {
        /// Action that was sent.
        action: OfflineAction,
        /// Outcome of the attempt.
        outcome: SendOutcome,
    },

    /// The armed backoff timer expired; the head may be sent again.
    RetryElapsed,

    /// Connectivity changed.
    Connectivity(bool),

    /// Explicit producer-initiated flush of the queue head.
    Flush,

    /// Internal re-entry after a terminal resolution, draining the next
    /// queued action.
    Drain,
}

/// Configuration for the delivery engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Commit template for actions that do not supply their own.
    pub default_commit: outbox_core::ActionTemplate,

    /// Rollback template for actions that do not supply their own.
    pub default_rollback: outbox_core::ActionTemplate,

    /// Retry decision logic.
    pub policy: Arc<dyn RetryPolicy>,

    /// Optional side effect applied on the success path before the
    /// transaction resolves.
    pub commit_hook: Option<Arc<dyn CommitHook>>,

    /// Initial connectivity assumption.
    pub start_online: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_commit: outbox_core::ActionTemplate::new(crate::DEFAULT_COMMIT_KIND),
            default_rollback: outbox_core::ActionTemplate::new(crate::DEFAULT_ROLLBACK_KIND),
            policy: Arc::new(DecaySchedule::default()),
            commit_hook: None,
            start_online: true,
        }
    }
}

/// Counters for engine monitoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    /// Actions enqueued through the handle.
    pub enqueued: u64,
    /// Send attempts started.
    pub sends_started: u64,
    /// Terminal commits emitted.
    pub commits: u64,
    /// Terminal rollbacks emitted.
    pub rollbacks: u64,
    /// Backoff timers armed.
    pub retries_scheduled: u64,
}

/// Delivery engine owning one queue's event loop.
pub struct OutboxEngine {
    queue: Arc<dyn OutboxQueue>,
    state: Arc<RwLock<DeliveryState>>,
    stats: Arc<RwLock<EngineStats>>,
    tracker: Arc<TransactionTracker>,
    sender: EffectSender,
    processor: ResultProcessor,
    scheduler: RetryScheduler,
    sink: Arc<dyn EventSink>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    cancellation: CancellationToken,
}

impl OutboxEngine {
    /// Creates an engine over the given queue, executor, and sink.
    ///
    /// The engine does nothing until [`OutboxEngine::run`] is spawned.
    pub fn new(
        queue: Arc<dyn OutboxQueue>,
        executor: Arc<dyn EffectExecutor>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let tracker = Arc::new(TransactionTracker::new());

        let sender = EffectSender::new(executor, sink.clone(), clock.clone(), events_tx.clone());
        let processor = ResultProcessor::new(
            config.default_commit,
            config.default_rollback,
            config.policy,
            config.commit_hook,
            tracker.clone(),
            clock.clone(),
        );
        let scheduler = RetryScheduler::new(clock, events_tx.clone());

        Self {
            queue,
            state: Arc::new(RwLock::new(DeliveryState::with_online(config.start_online))),
            stats: Arc::new(RwLock::new(EngineStats::default())),
            tracker,
            sender,
            processor,
            scheduler,
            sink,
            events_tx,
            events_rx,
            cancellation: CancellationToken::new(),
        }
    }

    /// Returns a producer-facing handle to this engine.
    pub fn handle(&self) -> OutboxHandle {
        OutboxHandle {
            events: self.events_tx.clone(),
            queue: self.queue.clone(),
            state: self.state.clone(),
            stats: self.stats.clone(),
            tracker: self.tracker.clone(),
            cancellation: self.cancellation.clone(),
        }
    }

    /// Runs the event loop until shutdown or all handles are dropped.
    ///
    /// One event at a time: no two coordinator invocations execute
    /// concurrently for the same queue. On exit every still-pending
    /// transaction is rejected so producers never hang on a handle.
    pub async fn run(mut self) {
        {
            let state = self.state.read().await;
            info!(online = state.online, queued = self.queue.len(), "outbox delivery engine started");
        }

        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => {
                    info!("outbox delivery engine received shutdown signal");
                    break;
                }
                event = self.events_rx.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                }
            }
        }

        self.tracker.reject_all(EffectError::internal("delivery engine stopped"));
        info!("outbox delivery engine stopped");
    }

    async fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SendResult { action, outcome } => {
                self.on_send_result(action, outcome).await;
            },
            EngineEvent::RetryElapsed => self.on_retry_elapsed().await,
            EngineEvent::Connectivity(online) => self.on_connectivity(online).await,
            EngineEvent::Flush => self.on_flush().await,
            EngineEvent::Enqueued | EngineEvent::Drain => self.maybe_send().await,
        }
    }

    /// Processes a delivery result for the previously sent action.
    ///
    /// Clearing `busy` belongs to this path, never to the sender. No new
    /// send is attempted in the same invocation; terminal resolutions
    /// re-enter the loop as a `Drain` event instead.
    async fn on_send_result(&mut self, action: OfflineAction, outcome: SendOutcome) {
        let retry_count = {
            let mut state = self.state.write().await;
            state.busy = false;
            state.retry_count
        };

        self.sink
            .handle(OutboxEvent::SendResult {
                action: action.clone(),
                success: outcome.is_success(),
                error: match &outcome {
                    SendOutcome::Failure(error) => Some(error.clone()),
                    SendOutcome::Success(_) => None,
                },
            })
            .await;

        match self.processor.process(&action, outcome, retry_count) {
            Disposition::Reschedule(delay) => {
                let retry_count = {
                    let mut state = self.state.write().await;
                    state.retry_count += 1;
                    state.retry_scheduled = true;
                    state.retry_count
                };
                self.stats.write().await.retries_scheduled += 1;
                warn!(
                    kind = %action.kind,
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "send failed, retry scheduled"
                );
                self.scheduler.arm(delay);
                self.sink.handle(OutboxEvent::RetryScheduled { delay, retry_count }).await;
            },
            Disposition::Complete(completed) => {
                self.queue.dequeue();
                self.state.write().await.retry_count = 0;

                if completed.is_success() {
                    self.stats.write().await.commits += 1;
                    info!(kind = %completed.kind, "action committed");
                    self.sink.handle(OutboxEvent::Committed(completed)).await;
                } else {
                    self.stats.write().await.rollbacks += 1;
                    error!(
                        kind = %completed.kind,
                        error = completed.error.as_ref().map(ToString::to_string).unwrap_or_default(),
                        "action rolled back"
                    );
                    self.sink.handle(OutboxEvent::RolledBack(completed)).await;
                }

                // Terminal re-entry drains the next queued action on a
                // fresh invocation.
                let _ = self.events_tx.send(EngineEvent::Drain);
            },
        }
    }

    /// Clears the timer gate, then re-checks the send preconditions
    /// against the current queue head.
    ///
    /// The head is resolved here, at fire time, so a timer armed for an
    /// action that has since left the queue acts on its successor.
    async fn on_retry_elapsed(&mut self) {
        self.state.write().await.retry_scheduled = false;
        self.sink.handle(OutboxEvent::RetryCompleted).await;
        self.maybe_send().await;
    }

    async fn on_connectivity(&mut self, online: bool) {
        self.state.write().await.online = online;
        info!(online, "connectivity changed");
        self.maybe_send().await;
    }

    /// Explicit producer flush: duplicate-guarded by the busy/online
    /// checks but deliberately not by the timer gate, so a producer can
    /// force an attempt ahead of an armed backoff window.
    async fn on_flush(&mut self) {
        let state = *self.state.read().await;
        if state.busy || !state.online {
            debug!(busy = state.busy, online = state.online, "flush skipped");
            return;
        }
        if let Some(head) = self.queue.peek() {
            self.begin_send(head, state.retry_count).await;
        }
    }

    /// The unconditional "try to drain the queue" path taken on most
    /// events once preconditions hold.
    async fn maybe_send(&mut self) {
        let state = *self.state.read().await;
        if state.busy || state.retry_scheduled || !state.online {
            return;
        }
        if let Some(head) = self.queue.peek() {
            self.begin_send(head, state.retry_count).await;
        }
    }

    async fn begin_send(&mut self, action: OfflineAction, retry_count: u32) {
        self.state.write().await.busy = true;
        self.stats.write().await.sends_started += 1;
        self.sender.send(action, retry_count).await;
    }
}

/// Producer-facing handle to a running engine.
///
/// Cloneable and usable from any task; no handle operation drives the
/// event loop.
#[derive(Debug, Clone)]
pub struct OutboxHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
    queue: Arc<dyn OutboxQueue>,
    state: Arc<RwLock<DeliveryState>>,
    stats: Arc<RwLock<EngineStats>>,
    tracker: Arc<TransactionTracker>,
    cancellation: CancellationToken,
}

impl OutboxHandle {
    /// Enqueues an action for reliable delivery.
    ///
    /// When the action carries a transaction id, the transaction is
    /// registered before the event enters the loop and the completion
    /// handle is returned for the producer to await.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateTransaction`] for a reused id and
    /// [`EngineError::EngineStopped`] if the event loop has exited.
    pub async fn enqueue(&self, action: OfflineAction) -> Result<Option<CompletionHandle>> {
        let handle = match action.transaction() {
            Some(id) => Some(self.tracker.register(id)?),
            None => None,
        };

        self.queue.enqueue(action);
        self.stats.write().await.enqueued += 1;
        self.events.send(EngineEvent::Enqueued).map_err(|_| EngineError::EngineStopped)?;
        Ok(handle)
    }

    /// Requests an explicit send of the queue head.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EngineStopped`] if the event loop has
    /// exited.
    pub fn flush(&self) -> Result<()> {
        self.events.send(EngineEvent::Flush).map_err(|_| EngineError::EngineStopped)
    }

    /// Signals a connectivity change.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EngineStopped`] if the event loop has
    /// exited.
    pub fn set_online(&self, online: bool) -> Result<()> {
        self.events.send(EngineEvent::Connectivity(online)).map_err(|_| EngineError::EngineStopped)
    }

    /// Snapshot of the coordinator's decision state.
    pub async fn state(&self) -> DeliveryState {
        *self.state.read().await
    }

    /// Snapshot of the engine counters.
    pub async fn stats(&self) -> EngineStats {
        *self.stats.read().await
    }

    /// Number of pending actions in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of transactions still awaiting settlement.
    pub fn pending_transactions(&self) -> usize {
        self.tracker.pending_count()
    }

    /// Signals the engine to stop after the current event.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }
}
