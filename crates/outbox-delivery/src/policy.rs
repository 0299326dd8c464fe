//! Pluggable retry policies for failed sends.
//!
//! A policy answers two questions about a failure, always in this order:
//! `discard` decides whether the failure is permanent, and only when it is
//! not, `retry` supplies the backoff delay before the next attempt (or
//! `None` to give up anyway). A policy must never be asked to compute a
//! delay for an action already judged non-retryable.

use std::time::Duration;

use outbox_core::{EffectError, OfflineAction};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Retry decision logic supplied by the embedding application.
///
/// Both methods are fallible: a fault in either is contained by the result
/// processor and treated as discard=true, so a buggy policy degrades to
/// permanent failure instead of retrying forever.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Decides whether this failure is permanent.
    ///
    /// # Errors
    ///
    /// A [`PolicyError`] is treated by the caller as discard=true.
    fn discard(
        &self,
        error: &EffectError,
        action: &OfflineAction,
        retry_count: u32,
    ) -> std::result::Result<bool, PolicyError>;

    /// Delay before the next attempt, or `None` to give up without
    /// discarding.
    ///
    /// Only consulted when [`RetryPolicy::discard`] returned false.
    ///
    /// # Errors
    ///
    /// A [`PolicyError`] is treated by the caller as discard=true.
    fn retry(
        &self,
        action: &OfflineAction,
        retry_count: u32,
    ) -> std::result::Result<Option<Duration>, PolicyError>;
}

/// Default policy: a fixed ladder of delays indexed by retry count.
///
/// Discards non-retryable failures immediately and gives up once the
/// ladder is exhausted. The default ladder backs off from 1 second to 1
/// hour over ten attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecaySchedule {
    delays: Vec<Duration>,
}

impl DecaySchedule {
    /// Creates a schedule with a custom delay ladder.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Creates a schedule that retries `attempts` times at a fixed delay.
    pub fn fixed(delay: Duration, attempts: usize) -> Self {
        Self { delays: vec![delay; attempts] }
    }

    /// Maximum number of retries before giving up.
    pub fn max_retries(&self) -> u32 {
        u32::try_from(self.delays.len()).unwrap_or(u32::MAX)
    }
}

impl Default for DecaySchedule {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(3 * 60),
                Duration::from_secs(5 * 60),
                Duration::from_secs(10 * 60),
                Duration::from_secs(30 * 60),
                Duration::from_secs(60 * 60),
            ],
        }
    }
}

impl RetryPolicy for DecaySchedule {
    fn discard(
        &self,
        error: &EffectError,
        _action: &OfflineAction,
        retry_count: u32,
    ) -> std::result::Result<bool, PolicyError> {
        Ok(!error.is_retryable() || retry_count >= self.max_retries())
    }

    fn retry(
        &self,
        _action: &OfflineAction,
        retry_count: u32,
    ) -> std::result::Result<Option<Duration>, PolicyError> {
        Ok(self.delays.get(retry_count as usize).copied())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn action() -> OfflineAction {
        OfflineAction::new("ping", json!({"url": "/ping"}))
    }

    #[test]
    fn default_ladder_backs_off_from_seconds_to_an_hour() {
        let policy = DecaySchedule::default();
        let action = action();

        assert_eq!(policy.retry(&action, 0), Ok(Some(Duration::from_secs(1))));
        assert_eq!(policy.retry(&action, 1), Ok(Some(Duration::from_secs(5))));
        assert_eq!(policy.retry(&action, 4), Ok(Some(Duration::from_secs(60))));
        assert_eq!(policy.retry(&action, 9), Ok(Some(Duration::from_secs(3600))));
        // Past the end of the ladder the policy declines further retries.
        assert_eq!(policy.retry(&action, 10), Ok(None));
    }

    #[test]
    fn transient_failures_are_not_discarded() {
        let policy = DecaySchedule::default();
        let action = action();

        assert_eq!(policy.discard(&EffectError::network("refused"), &action, 0), Ok(false));
        assert_eq!(policy.discard(&EffectError::http(503, ""), &action, 3), Ok(false));
    }

    #[test]
    fn client_errors_are_discarded_immediately() {
        let policy = DecaySchedule::default();
        let action = action();

        assert_eq!(policy.discard(&EffectError::http(404, "not found"), &action, 0), Ok(true));
        assert_eq!(policy.discard(&EffectError::internal("hook fault"), &action, 0), Ok(true));
    }

    #[test]
    fn exhausted_ladder_discards_even_transient_failures() {
        let policy = DecaySchedule::fixed(Duration::from_millis(100), 3);
        let action = action();
        let error = EffectError::timeout(30);

        assert_eq!(policy.discard(&error, &action, 2), Ok(false));
        assert_eq!(policy.discard(&error, &action, 3), Ok(true));
    }

    #[test]
    fn fixed_schedule_repeats_one_delay() {
        let policy = DecaySchedule::fixed(Duration::from_millis(250), 2);
        let action = action();

        assert_eq!(policy.retry(&action, 0), Ok(Some(Duration::from_millis(250))));
        assert_eq!(policy.retry(&action, 1), Ok(Some(Duration::from_millis(250))));
        assert_eq!(policy.retry(&action, 2), Ok(None));
    }
}
