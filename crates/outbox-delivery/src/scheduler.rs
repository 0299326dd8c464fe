//! One-shot backoff timer between failed attempts.
//!
//! Arms a single timer per reschedule; on expiry the "retry window
//! elapsed" signal re-enters the engine, which resolves the queue head
//! lazily at fire time. The `retry_scheduled` flag gate in the coordinator
//! guarantees at most one armed timer, so stale timers are harmless and no
//! cancellation is required.

use std::{sync::Arc, time::Duration};

use outbox_core::Clock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::EngineEvent;

/// Arms one-shot retry timers for the delivery engine.
#[derive(Debug)]
pub struct RetryScheduler {
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl RetryScheduler {
    /// Creates a scheduler wired to the engine's inbound event channel.
    pub fn new(clock: Arc<dyn Clock>, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { clock, events }
    }

    /// Arms a timer that signals `RetryElapsed` after `delay`.
    ///
    /// A zero delay fires on the next scheduling opportunity. The signal
    /// carries no action reference; whatever is at the queue head when it
    /// fires is what gets sent.
    pub fn arm(&self, delay: Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "retry timer armed");
        let clock = self.clock.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            clock.sleep(delay).await;
            if events.send(EngineEvent::RetryElapsed).is_err() {
                debug!("engine stopped before retry window elapsed");
            }
        });
    }
}
