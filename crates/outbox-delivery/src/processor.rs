//! Result processor: turns one send outcome into commit, rollback, or
//! reschedule.
//!
//! Drives the transaction tracker and contains faults from pluggable
//! callbacks. The propagation policy is "contain and degrade": a policy or
//! hook fault is logged and treated as permanent failure, preserving queue
//! liveness. Only the terminal commit/rollback action and the transaction
//! settlement are visible to producers.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use outbox_core::{
    ActionTemplate, Clock, CompletedAction, EffectError, OfflineAction, SendOutcome,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::HookError, policy::RetryPolicy, tracker::TransactionTracker};

/// Caller-supplied side effect applied on the success path.
///
/// Runs before the transaction resolves. A [`HookError`] downgrades the
/// success into a rollback carrying an internal-error marker; the executor
/// payload is discarded from the commit path.
pub trait CommitHook: Send + Sync + std::fmt::Debug {
    /// Applies commit side effects for the given terminal action.
    ///
    /// # Errors
    ///
    /// Returns [`HookError`] to downgrade the commit into a rollback.
    fn apply(&self, action: &CompletedAction) -> std::result::Result<(), HookError>;
}

/// What the coordinator should do with a processed outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Terminal resolution: dequeue the head and emit this action.
    Complete(CompletedAction),

    /// Keep the head, increment the retry count, and arm a timer.
    Reschedule(Duration),
}

/// State machine consuming send outcomes, one per in-flight action.
#[derive(Debug)]
pub struct ResultProcessor {
    default_commit: ActionTemplate,
    default_rollback: ActionTemplate,
    policy: Arc<dyn RetryPolicy>,
    commit_hook: Option<Arc<dyn CommitHook>>,
    tracker: Arc<TransactionTracker>,
    clock: Arc<dyn Clock>,
}

impl ResultProcessor {
    /// Creates a processor with the engine's configured templates, policy,
    /// and optional commit hook.
    pub fn new(
        default_commit: ActionTemplate,
        default_rollback: ActionTemplate,
        policy: Arc<dyn RetryPolicy>,
        commit_hook: Option<Arc<dyn CommitHook>>,
        tracker: Arc<TransactionTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { default_commit, default_rollback, policy, commit_hook, tracker, clock }
    }

    /// Processes one send outcome for the action that was sent.
    ///
    /// `retry_count` is the number of failed attempts of this action prior
    /// to the one that produced `outcome`.
    pub fn process(
        &self,
        action: &OfflineAction,
        outcome: SendOutcome,
        retry_count: u32,
    ) -> Disposition {
        match outcome {
            SendOutcome::Success(payload) => self.process_success(action, payload),
            SendOutcome::Failure(error) => self.process_failure(action, error, retry_count),
        }
    }

    fn process_success(&self, action: &OfflineAction, payload: Option<Value>) -> Disposition {
        let commit = self.build_commit(action, payload.clone());

        if let Some(hook) = &self.commit_hook {
            if let Err(fault) = hook.apply(&commit) {
                warn!(
                    kind = %action.kind,
                    error = %fault,
                    "commit hook fault, downgrading to rollback"
                );
                return self.complete_rollback(action, EffectError::internal(fault.to_string()));
            }
        }

        if let Some(transaction) = action.transaction() {
            self.tracker.resolve(transaction, payload);
        }
        Disposition::Complete(commit)
    }

    fn process_failure(
        &self,
        action: &OfflineAction,
        error: EffectError,
        retry_count: u32,
    ) -> Disposition {
        // Discard is always evaluated first; retry is never consulted for
        // an action already judged non-retryable.
        let discard = match self.policy.discard(&error, action, retry_count) {
            Ok(discard) => discard,
            Err(fault) => {
                warn!(kind = %action.kind, error = %fault, "discard predicate fault, giving up");
                true
            },
        };

        if !discard {
            match self.policy.retry(action, retry_count) {
                Ok(Some(delay)) => return Disposition::Reschedule(delay),
                Ok(None) => {
                    // Policy declined further retries without discarding:
                    // intentional permanent failure.
                    debug!(kind = %action.kind, retry_count, "retry policy declined further attempts");
                },
                Err(fault) => {
                    warn!(kind = %action.kind, error = %fault, "retry policy fault, giving up");
                },
            }
        }

        self.complete_rollback(action, error)
    }

    fn complete_rollback(&self, action: &OfflineAction, error: EffectError) -> Disposition {
        if let Some(transaction) = action.transaction() {
            self.tracker.reject(transaction, error.clone());
        }
        Disposition::Complete(self.build_rollback(action, error))
    }

    fn build_commit(&self, action: &OfflineAction, payload: Option<Value>) -> CompletedAction {
        let completed_at = self.timestamp();
        match &action.meta.commit {
            Some(template) => CompletedAction::committed(template.clone(), payload, None, completed_at),
            None => CompletedAction::committed(
                self.default_commit.clone(),
                payload,
                Some(action.clone()),
                completed_at,
            ),
        }
    }

    fn build_rollback(&self, action: &OfflineAction, error: EffectError) -> CompletedAction {
        let completed_at = self.timestamp();
        match &action.meta.rollback {
            Some(template) => CompletedAction::rolled_back(template.clone(), error, None, completed_at),
            None => CompletedAction::rolled_back(
                self.default_rollback.clone(),
                error,
                Some(action.clone()),
                completed_at,
            ),
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.now_system())
    }
}
