//! Reliable delivery engine for offline actions.
//!
//! This crate implements the delivery state machine that drains a FIFO
//! queue of offline actions one at a time, surviving transient
//! connectivity loss. Failed sends are retried per a pluggable policy
//! until a pluggable discard predicate gives up, at which point the
//! action's rollback fires instead of its commit.
//!
//! # Architecture
//!
//! A single event loop coordinates the pipeline; at most one action is
//! in flight and at most one backoff timer is armed per queue:
//!
//! 1. **Coordinate** - The engine reads queue/connectivity/busy state on
//!    every inbound event and decides whether to send the queue head
//! 2. **Send** - The effect sender performs one executor attempt off the
//!    loop and feeds the outcome back in as an event
//! 3. **Process** - The result processor turns the outcome into a commit,
//!    a rollback, or a reschedule, settling the awaiting transaction
//! 4. **Back off** - The retry scheduler arms a one-shot timer whose
//!    expiry re-enters the loop against the *current* queue head
//!
//! # Key Features
//!
//! - **At-most-one in flight** - The `busy` flag is the mutual-exclusion
//!   mechanism between send-issued and result-received
//! - **Awaitable outcomes** - Producers hold a completion handle settled
//!   exactly once when their action commits or rolls back
//! - **Contain and degrade** - Faults in pluggable policies and hooks are
//!   logged and downgraded to permanent failure, never fatal
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use outbox_core::{NoOpSink, OfflineAction, SystemClock, TransactionId};
//! use outbox_delivery::{EngineConfig, InMemoryQueue, OutboxEngine};
//! use serde_json::json;
//!
//! # async fn example(executor: Arc<dyn outbox_delivery::EffectExecutor>) -> anyhow::Result<()> {
//! let queue = Arc::new(InMemoryQueue::new());
//! let engine = OutboxEngine::new(
//!     queue,
//!     executor,
//!     EngineConfig::default(),
//!     Arc::new(SystemClock::new()),
//!     Arc::new(NoOpSink::new()),
//! );
//! let handle = engine.handle();
//! tokio::spawn(engine.run());
//!
//! let action = OfflineAction::new("follow_user", json!({"url": "/follow"}))
//!     .with_transaction(TransactionId::new());
//! let pending = handle.enqueue(action).await?.expect("transaction attached");
//! let outcome = pending.wait().await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod policy;
pub mod processor;
pub mod queue;
pub mod scheduler;
pub mod sender;
pub mod tracker;

pub use engine::{EngineConfig, EngineEvent, EngineStats, OutboxEngine, OutboxHandle};
pub use error::{EngineError, HookError, PolicyError, Result};
pub use policy::{DecaySchedule, RetryPolicy};
pub use processor::{CommitHook, Disposition, ResultProcessor};
pub use queue::{InMemoryQueue, OutboxQueue};
pub use scheduler::RetryScheduler;
pub use sender::{EffectExecutor, EffectSender};
pub use tracker::{CompletionHandle, TransactionResult, TransactionTracker};

/// Action kind of the default commit template.
pub const DEFAULT_COMMIT_KIND: &str = "outbox/commit";

/// Action kind of the default rollback template.
pub const DEFAULT_ROLLBACK_KIND: &str = "outbox/rollback";
