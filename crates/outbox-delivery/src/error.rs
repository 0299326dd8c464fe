//! Error types for the delivery engine.
//!
//! Faults in pluggable callbacks (retry policies, commit hooks) get their
//! own types so the result processor can contain them locally; engine
//! errors surface only at the producer-facing handle.

use outbox_core::TransactionId;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced to producers through the engine handle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A transaction id was registered twice. Ids are never reused.
    #[error("transaction {0} is already registered")]
    DuplicateTransaction(TransactionId),

    /// The engine event loop is no longer running.
    #[error("delivery engine is not running")]
    EngineStopped,
}

/// Fault raised by a pluggable retry policy.
///
/// Contained by the result processor: logged and treated as discard=true
/// rather than retrying forever on a buggy policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("retry policy fault: {0}")]
pub struct PolicyError(pub String);

impl PolicyError {
    /// Creates a policy fault from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Fault raised by a caller-supplied commit hook.
///
/// Contained by the result processor: the success outcome downgrades to a
/// rollback instead of crashing the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("commit hook fault: {0}")]
pub struct HookError(pub String);

impl HookError {
    /// Creates a hook fault from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_format() {
        let id = TransactionId::new();
        let error = EngineError::DuplicateTransaction(id);
        assert_eq!(error.to_string(), format!("transaction {id} is already registered"));

        assert_eq!(PolicyError::new("index out of range").to_string(), "retry policy fault: index out of range");
        assert_eq!(HookError::new("store write failed").to_string(), "commit hook fault: store write failed");
    }
}
