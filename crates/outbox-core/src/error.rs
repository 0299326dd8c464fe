//! Effect failure taxonomy for outbox delivery.
//!
//! Defines the error type produced by effect executors and carried through
//! send outcomes, rollback actions, and transaction rejections. Errors are
//! categorized for retry decisions: the default discard predicate gives up
//! on failures that are not retryable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by an effect executor for a single send attempt.
///
/// Cloneable so a single failure can flow into the rollback action, the
/// transaction rejection, and the lifecycle event stream without ownership
/// gymnastics.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EffectError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// Effect execution timed out.
    #[error("effect timed out after {seconds}s")]
    Timeout {
        /// Number of seconds before the attempt timed out
        seconds: u64,
    },

    /// Remote endpoint responded with an error status.
    #[error("http error: status {status}")]
    Http {
        /// HTTP-style status code reported by the executor
        status: u16,
        /// Response body or diagnostic content
        body: String,
    },

    /// Failure originating inside the engine rather than the executor.
    ///
    /// Produced when a commit hook faults or when a pending transaction is
    /// settled during engine shutdown.
    #[error("internal delivery error: {message}")]
    Internal {
        /// Internal error message
        message: String,
    },
}

impl EffectError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    /// Creates an HTTP-style error from a status code and body.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http { status, body: body.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether this failure is worth retrying.
    ///
    /// Network failures, timeouts, and server-side statuses (5xx, 429) are
    /// transient. Client errors (other 4xx) and internal faults are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Internal { .. } => false,
        }
    }

    /// Status code reported by the executor, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_identified_correctly() {
        assert!(EffectError::network("connection refused").is_retryable());
        assert!(EffectError::timeout(30).is_retryable());
        assert!(EffectError::http(500, "internal server error").is_retryable());
        assert!(EffectError::http(429, "slow down").is_retryable());

        assert!(!EffectError::http(404, "not found").is_retryable());
        assert!(!EffectError::http(400, "bad request").is_retryable());
        assert!(!EffectError::internal("commit hook fault").is_retryable());
    }

    #[test]
    fn status_extracted_from_http_errors_only() {
        assert_eq!(EffectError::http(503, "unavailable").status(), Some(503));
        assert_eq!(EffectError::timeout(10).status(), None);
    }

    #[test]
    fn error_display_format() {
        let error = EffectError::timeout(30);
        assert_eq!(error.to_string(), "effect timed out after 30s");

        let http = EffectError::http(502, "bad gateway");
        assert_eq!(http.to_string(), "http error: status 502");
    }
}
