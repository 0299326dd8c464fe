//! Action fixtures with sensible defaults for test setup.

use outbox_core::{OfflineAction, TransactionId};
use serde_json::json;

/// Creates a minimal offline action with the given kind.
pub fn action(kind: &str) -> OfflineAction {
    OfflineAction::new(kind, json!({"url": format!("/{kind}")}))
        .with_payload(json!({"fixture": kind}))
}

/// Creates an offline action tagged with a fresh transaction id.
pub fn tracked_action(kind: &str) -> (TransactionId, OfflineAction) {
    let id = TransactionId::new();
    (id, action(kind).with_transaction(id))
}
