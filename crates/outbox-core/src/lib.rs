//! Core domain models and event types for the outbox delivery engine.
//!
//! Provides strongly-typed domain primitives, lifecycle event definitions,
//! the effect error taxonomy, and the clock abstraction. The delivery
//! engine crate depends on these foundational types for type safety and
//! consistency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::EffectError;
pub use events::{EventSink, MulticastSink, NoOpSink, OutboxEvent};
pub use models::{
    ActionTemplate, CompletedAction, CompletedMeta, DeliveryState, OfflineAction, OfflineMeta,
    SendOutcome, TransactionId,
};
pub use time::{Clock, SystemClock, TestClock};
