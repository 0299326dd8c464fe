//! Core domain models and strongly-typed identifiers.
//!
//! Defines offline actions, their compensating commit/rollback templates,
//! terminal completed actions, the delivery state snapshot, and the newtype
//! transaction identifier producers use to await outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EffectError;

/// Strongly-typed transaction identifier.
///
/// Correlates one enqueued offline action with its eventual outcome. Wraps
/// a UUID to prevent mixing with other ID types; an id is never reused once
/// registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    /// Creates a new random transaction ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TransactionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A unit of work requiring reliable, retried delivery.
///
/// Carries an opaque payload, an opaque effect descriptor handed to the
/// executor, and optional compensating commit/rollback templates. Actions
/// stay at the queue head while awaiting retry and leave the queue only on
/// terminal resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    /// Action type discriminator chosen by the producer.
    pub kind: String,

    /// Opaque producer payload.
    pub payload: Option<Value>,

    /// Delivery metadata: effect descriptor and compensating outcomes.
    pub meta: OfflineMeta,
}

/// Delivery metadata attached to an [`OfflineAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineMeta {
    /// Opaque descriptor passed verbatim to the effect executor.
    pub effect: Value,

    /// Action template emitted on success. Falls back to the engine's
    /// configured default commit when absent.
    pub commit: Option<ActionTemplate>,

    /// Action template emitted on permanent failure. Falls back to the
    /// engine's configured default rollback when absent.
    pub rollback: Option<ActionTemplate>,

    /// Correlation id producers use to await the outcome.
    pub transaction: Option<TransactionId>,
}

impl OfflineAction {
    /// Creates an offline action with the given kind and effect descriptor.
    pub fn new(kind: impl Into<String>, effect: Value) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            meta: OfflineMeta { effect, commit: None, rollback: None, transaction: None },
        }
    }

    /// Attaches an opaque payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Overrides the commit action emitted on success.
    #[must_use]
    pub fn with_commit(mut self, commit: ActionTemplate) -> Self {
        self.meta.commit = Some(commit);
        self
    }

    /// Overrides the rollback action emitted on permanent failure.
    #[must_use]
    pub fn with_rollback(mut self, rollback: ActionTemplate) -> Self {
        self.meta.rollback = Some(rollback);
        self
    }

    /// Tags the action with a transaction id so its outcome can be awaited.
    #[must_use]
    pub fn with_transaction(mut self, transaction: TransactionId) -> Self {
        self.meta.transaction = Some(transaction);
        self
    }

    /// Transaction id attached to this action, if any.
    pub fn transaction(&self) -> Option<TransactionId> {
        self.meta.transaction
    }
}

/// Template for a terminal commit or rollback action.
///
/// Producers supply these per action; the engine also holds configured
/// defaults for actions that do not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
    /// Action type discriminator of the emitted completed action.
    pub kind: String,

    /// Extra caller metadata carried through to the completed action.
    pub meta: Value,
}

impl ActionTemplate {
    /// Creates a template with the given kind and no extra metadata.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), meta: Value::Null }
    }

    /// Attaches extra metadata carried through to the completed action.
    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Terminal commit or rollback action emitted once per offline action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedAction {
    /// Action type discriminator from the commit/rollback template.
    pub kind: String,

    /// Executor payload on commit; absent on rollback.
    pub payload: Option<Value>,

    /// Failure that caused the rollback; absent on commit.
    pub error: Option<EffectError>,

    /// Terminal metadata.
    pub meta: CompletedMeta,
}

/// Metadata attached to a terminal [`CompletedAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedMeta {
    /// Whether the offline action was delivered.
    pub success: bool,

    /// Always true on terminal emission.
    pub completed: bool,

    /// Original offline action, attached when the engine's default
    /// template was used so consumers retain context. Caller-supplied
    /// templates carry their own context and omit it.
    pub offline_action: Option<Box<OfflineAction>>,

    /// Extra metadata from the commit/rollback template.
    pub extra: Value,

    /// When the terminal resolution occurred.
    pub completed_at: DateTime<Utc>,
}

impl CompletedAction {
    /// Builds the terminal commit action for a delivered offline action.
    pub fn committed(
        template: ActionTemplate,
        payload: Option<Value>,
        offline_action: Option<OfflineAction>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: template.kind,
            payload,
            error: None,
            meta: CompletedMeta {
                success: true,
                completed: true,
                offline_action: offline_action.map(Box::new),
                extra: template.meta,
                completed_at,
            },
        }
    }

    /// Builds the terminal rollback action for a permanently failed offline
    /// action.
    pub fn rolled_back(
        template: ActionTemplate,
        error: EffectError,
        offline_action: Option<OfflineAction>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: template.kind,
            payload: None,
            error: Some(error),
            meta: CompletedMeta {
                success: false,
                completed: true,
                offline_action: offline_action.map(Box::new),
                extra: template.meta,
                completed_at,
            },
        }
    }

    /// Whether this terminal action is a commit.
    pub fn is_success(&self) -> bool {
        self.meta.success
    }
}

/// Snapshot of the delivery coordinator's decision state.
///
/// Explicit state struct read on every coordinator invocation; there are no
/// ambient globals. `busy` is the mutual-exclusion mechanism preventing a
/// second concurrent send, `retry_scheduled` gates the single backoff
/// timer, and `retry_count` tracks failed attempts of the current queue
/// head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryState {
    /// A send is currently outstanding.
    pub busy: bool,

    /// A backoff timer is armed.
    pub retry_scheduled: bool,

    /// Connectivity signal; no sends are attempted while offline.
    pub online: bool,

    /// Failed attempts of the current head action. Resets to 0 on terminal
    /// resolution.
    pub retry_count: u32,
}

impl Default for DeliveryState {
    fn default() -> Self {
        Self { busy: false, retry_scheduled: false, online: true, retry_count: 0 }
    }
}

impl DeliveryState {
    /// Creates an idle state with the given connectivity.
    pub fn with_online(online: bool) -> Self {
        Self { online, ..Self::default() }
    }
}

/// Outcome of one send attempt, always paired with the action that was
/// sent.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The executor delivered the effect, possibly returning a payload.
    Success(Option<Value>),

    /// The executor failed or reported a failure.
    Failure(EffectError),
}

impl SendOutcome {
    /// Whether the attempt succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn action_builder_attaches_metadata() {
        let txn = TransactionId::new();
        let action = OfflineAction::new("follow_user", json!({"url": "/follow"}))
            .with_payload(json!({"user_id": 7}))
            .with_commit(ActionTemplate::new("follow_user_committed"))
            .with_rollback(ActionTemplate::new("follow_user_rolled_back"))
            .with_transaction(txn);

        assert_eq!(action.kind, "follow_user");
        assert_eq!(action.transaction(), Some(txn));
        assert_eq!(action.meta.commit.as_ref().map(|c| c.kind.as_str()), Some("follow_user_committed"));
        assert_eq!(action.meta.rollback.as_ref().map(|r| r.kind.as_str()), Some("follow_user_rolled_back"));
    }

    #[test]
    fn committed_action_marks_success_and_completed() {
        let action = CompletedAction::committed(
            ActionTemplate::new("commit"),
            Some(json!({"ok": true})),
            None,
            Utc::now(),
        );

        assert!(action.is_success());
        assert!(action.meta.completed);
        assert!(action.error.is_none());
    }

    #[test]
    fn rolled_back_action_carries_error() {
        let original = OfflineAction::new("noop", Value::Null);
        let action = CompletedAction::rolled_back(
            ActionTemplate::new("rollback"),
            EffectError::http(404, "gone"),
            Some(original.clone()),
            Utc::now(),
        );

        assert!(!action.is_success());
        assert!(action.meta.completed);
        assert!(action.payload.is_none());
        assert_eq!(action.error, Some(EffectError::http(404, "gone")));
        assert_eq!(action.meta.offline_action.as_deref(), Some(&original));
    }

    #[test]
    fn delivery_state_defaults_to_idle_online() {
        let state = DeliveryState::default();
        assert!(state.online);
        assert!(!state.busy);
        assert!(!state.retry_scheduled);
        assert_eq!(state.retry_count, 0);

        assert!(!DeliveryState::with_online(false).online);
    }

    #[test]
    fn transaction_ids_are_unique() {
        assert_ne!(TransactionId::new(), TransactionId::new());
    }
}
