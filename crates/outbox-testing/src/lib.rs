//! Test infrastructure for deterministic delivery-engine testing.
//!
//! Provides a complete test environment: an engine wired to a scripted
//! effect executor, a recording event sink, an in-memory queue, and a
//! virtual clock so backoff windows elapse without real waiting.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use outbox_core::{OfflineAction, TestClock, TransactionId};
use outbox_delivery::{
    CompletionHandle, EngineConfig, InMemoryQueue, OutboxEngine, OutboxHandle,
};

pub mod executor;
pub mod fixtures;
pub mod sink;

pub use executor::ScriptedExecutor;
pub use fixtures::{action, tracked_action};
pub use sink::RecordingSink;

/// Test environment running one engine with controllable collaborators.
///
/// The engine loop runs as a spawned task; tests drive it through the
/// handle and synchronize on recorded events or completion handles.
pub struct TestEnv {
    /// Virtual clock; scheduler sleeps advance it immediately.
    pub clock: TestClock,
    /// Scripted effect executor.
    pub executor: Arc<ScriptedExecutor>,
    /// Records every lifecycle event the engine emits.
    pub sink: Arc<RecordingSink>,
    /// The queue under delivery.
    pub queue: Arc<InMemoryQueue>,
    handle: OutboxHandle,
    engine_task: tokio::task::JoinHandle<()>,
}

impl TestEnv {
    /// Creates an environment with the default engine configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an environment with a custom engine configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let clock = TestClock::new();
        let executor = Arc::new(ScriptedExecutor::new());
        let sink = Arc::new(RecordingSink::new());
        let queue = Arc::new(InMemoryQueue::new());

        let engine = OutboxEngine::new(
            queue.clone(),
            executor.clone(),
            config,
            Arc::new(clock.clone()),
            sink.clone(),
        );
        let handle = engine.handle();
        let engine_task = tokio::spawn(engine.run());

        Self { clock, executor, sink, queue, handle, engine_task }
    }

    /// Producer-facing handle to the running engine.
    pub fn handle(&self) -> &OutboxHandle {
        &self.handle
    }

    /// Enqueues an action tagged with a fresh transaction id.
    ///
    /// # Errors
    ///
    /// Fails if the engine has stopped.
    pub async fn enqueue_tracked(
        &self,
        action: OfflineAction,
    ) -> Result<(TransactionId, CompletionHandle)> {
        let id = TransactionId::new();
        let pending = self
            .handle
            .enqueue(action.with_transaction(id))
            .await?
            .expect("transaction id attached");
        Ok((id, pending))
    }

    /// Polls the recording sink until `pred` holds or `timeout` passes.
    ///
    /// # Errors
    ///
    /// Fails when the timeout expires before the predicate holds.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        pred: impl Fn(&RecordingSink) -> bool,
    ) -> Result<()> {
        let start = Instant::now();
        loop {
            if pred(&self.sink) {
                return Ok(());
            }
            if start.elapsed() > timeout {
                bail!("timed out waiting for expected lifecycle events");
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Stops the engine and waits for the loop to exit.
    pub async fn shutdown(self) {
        self.handle.shutdown();
        let _ = self.engine_task.await;
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
