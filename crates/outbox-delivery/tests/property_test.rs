//! Property-based tests for the retry policy and result processor.

use std::{sync::Arc, time::Duration};

use outbox_core::{
    ActionTemplate, EffectError, OfflineAction, SendOutcome, TestClock, TransactionId,
};
use outbox_delivery::{
    DecaySchedule, Disposition, ResultProcessor, RetryPolicy, TransactionResult,
    TransactionTracker,
};
use proptest::prelude::*;
use serde_json::json;

fn effect_error() -> impl Strategy<Value = EffectError> {
    prop_oneof![
        "[a-z ]{0,24}".prop_map(EffectError::network),
        (1u64..600).prop_map(EffectError::timeout),
        (100u16..600u16, "[a-z ]{0,24}").prop_map(|(status, body)| EffectError::http(status, body)),
        "[a-z ]{0,24}".prop_map(EffectError::internal),
    ]
}

fn delay_ladder() -> impl Strategy<Value = Vec<Duration>> {
    prop::collection::vec((1u64..7200).prop_map(Duration::from_secs), 0..12)
}

fn settlement() -> impl Strategy<Value = TransactionResult> {
    prop_oneof![
        prop::option::of(0u64..1000).prop_map(|n| Ok(n.map(|n| json!(n)))),
        effect_error().prop_map(Err),
    ]
}

fn processor(policy: Arc<dyn RetryPolicy>) -> (ResultProcessor, Arc<TransactionTracker>) {
    let tracker = Arc::new(TransactionTracker::new());
    let processor = ResultProcessor::new(
        ActionTemplate::new("outbox/commit"),
        ActionTemplate::new("outbox/rollback"),
        policy,
        None,
        tracker.clone(),
        Arc::new(TestClock::new()),
    );
    (processor, tracker)
}

fn sample_action() -> OfflineAction {
    OfflineAction::new("ping", json!({"url": "/ping"}))
}

proptest! {
    /// The ladder is indexed directly by retry count and runs out exactly
    /// at its length.
    #[test]
    fn ladder_delay_matches_retry_count(delays in delay_ladder(), retry_count in 0u32..16) {
        let policy = DecaySchedule::new(delays.clone());
        let delay = policy.retry(&sample_action(), retry_count).unwrap();
        prop_assert_eq!(delay, delays.get(retry_count as usize).copied());
    }

    /// Discard holds exactly when the failure is non-retryable or the
    /// ladder is exhausted.
    #[test]
    fn discard_is_retryability_and_budget(
        delays in delay_ladder(),
        error in effect_error(),
        retry_count in 0u32..16,
    ) {
        let policy = DecaySchedule::new(delays.clone());
        let discard = policy.discard(&error, &sample_action(), retry_count).unwrap();
        let expected = !error.is_retryable() || retry_count as usize >= delays.len();
        prop_assert_eq!(discard, expected);
    }

    /// Every terminal action is marked completed, and its success flag
    /// agrees with the absence of an error.
    #[test]
    fn terminal_actions_are_internally_consistent(
        error in effect_error(),
        retry_count in 0u32..16,
        succeed in any::<bool>(),
    ) {
        let (processor, _tracker) = processor(Arc::new(DecaySchedule::default()));
        let outcome = if succeed {
            SendOutcome::Success(Some(json!({"ok": true})))
        } else {
            SendOutcome::Failure(error)
        };

        match processor.process(&sample_action(), outcome, retry_count) {
            Disposition::Complete(completed) => {
                prop_assert!(completed.meta.completed);
                prop_assert_eq!(completed.meta.success, completed.error.is_none());
                prop_assert_eq!(completed.is_success(), succeed);
            }
            Disposition::Reschedule(delay) => {
                prop_assert!(!succeed);
                prop_assert_eq!(
                    Some(delay),
                    DecaySchedule::default().retry(&sample_action(), retry_count).unwrap()
                );
            }
        }
    }

    /// A failure either reschedules or rolls back; no outcome is dropped
    /// on the floor.
    #[test]
    fn every_failure_has_a_disposition(error in effect_error(), retry_count in 0u32..16) {
        let (processor, _tracker) = processor(Arc::new(DecaySchedule::default()));
        let disposition = processor.process(
            &sample_action(),
            SendOutcome::Failure(error.clone()),
            retry_count,
        );

        if error.is_retryable() && (retry_count as usize) < 10 {
            prop_assert!(matches!(disposition, Disposition::Reschedule(_)));
        } else {
            prop_assert!(
                matches!(disposition, Disposition::Complete(ref rollback) if !rollback.is_success())
            );
        }
    }

    /// A tracked transaction settles exactly once per terminal resolution,
    /// and never on a reschedule.
    #[test]
    fn transactions_settle_only_on_terminal_resolutions(
        error in effect_error(),
        retry_count in 0u32..16,
    ) {
        let (processor, tracker) = processor(Arc::new(DecaySchedule::default()));
        let id = TransactionId::new();
        let _pending = tracker.register(id).unwrap();
        let action = sample_action().with_transaction(id);

        let disposition =
            processor.process(&action, SendOutcome::Failure(error), retry_count);

        match disposition {
            Disposition::Reschedule(_) => prop_assert_eq!(tracker.pending_count(), 1),
            Disposition::Complete(_) => prop_assert_eq!(tracker.pending_count(), 0),
        }
    }

    /// Whatever sequence of resolves and rejects hits a transaction, the
    /// first settlement wins and the rest are ignored without panicking.
    #[test]
    fn first_settlement_wins_under_arbitrary_orderings(
        settlements in prop::collection::vec(settlement(), 1..6),
    ) {
        let tracker = TransactionTracker::new();
        let id = TransactionId::new();
        let handle = tracker.register(id).unwrap();

        for settlement in &settlements {
            match settlement {
                Ok(payload) => tracker.resolve(id, payload.clone()),
                Err(error) => tracker.reject(id, error.clone()),
            }
        }

        prop_assert_eq!(tracker.pending_count(), 0);
        let outcome = futures::executor::block_on(handle.wait());
        prop_assert_eq!(outcome, settlements[0].clone());
    }
}
