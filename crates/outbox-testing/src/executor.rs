//! Scripted effect executor for deterministic outcome sequences.
//!
//! Tests queue up per-attempt outcomes; the executor consumes them in
//! order and falls back to a configurable default once the script runs
//! out. Every invocation is recorded for verification.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use outbox_core::{EffectError, OfflineAction};
use outbox_delivery::EffectExecutor;
use serde_json::Value;

type ExecutionResult = std::result::Result<Option<Value>, EffectError>;

/// Effect executor returning pre-scripted outcomes.
#[derive(Debug)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<ExecutionResult>>,
    fallback: Mutex<ExecutionResult>,
    calls: Mutex<Vec<OfflineAction>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedExecutor {
    /// Creates an executor whose fallback outcome is success without a
    /// payload.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(None)),
            calls: Mutex::new(Vec::new()),
            latency: Mutex::new(None),
        }
    }

    /// Adds real latency to every attempt, keeping the engine busy long
    /// enough for concurrency assertions.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// Scripts one successful attempt returning the given payload.
    pub fn push_success(&self, payload: Option<Value>) {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(Ok(payload));
    }

    /// Scripts one failed attempt.
    pub fn push_failure(&self, error: EffectError) {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(Err(error));
    }

    /// Scripts `count` consecutive failed attempts.
    pub fn fail_times(&self, count: usize, error: EffectError) {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..count {
            script.push_back(Err(error.clone()));
        }
    }

    /// Sets the outcome used once the script is exhausted.
    pub fn set_fallback(&self, result: ExecutionResult) {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = result;
    }

    /// Actions passed to the executor, in invocation order.
    pub fn calls(&self) -> Vec<OfflineAction> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of attempts performed so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EffectExecutor for ScriptedExecutor {
    async fn execute(&self, _effect: &Value, action: &OfflineAction) -> ExecutionResult {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(action.clone());
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let scripted =
            self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match scripted {
            Some(result) => result,
            None => self.fallback.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}
