//! Bounded exponential-backoff retry around the step executor.
//!
//! The delay after failed attempt `n` (counting from 1) is
//! `interval * backoff_rate^(n-1)`. Policies carry no state between runs.

use crate::context::{ExecutionContext, RunIdentity};
use crate::core::{FailureKind, StepError};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::events::{EventKind, EventSink, PipelineEvent};
use crate::pipeline::StepDefinition;
use crate::steps::{StepAttempt, StepExecutor};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Retry configuration for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Failure kinds eligible for another attempt.
    pub retriable: HashSet<FailureKind>,
    /// Wait before the second attempt.
    pub interval: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Multiplier applied to the interval after each failed attempt.
    pub backoff_rate: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retriable: HashSet::from([FailureKind::TaskFailed, FailureKind::Timeout]),
            interval: Duration::from_secs(10),
            max_attempts: 2,
            backoff_rate: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the retriable failure kinds.
    #[must_use]
    pub fn with_retriable(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retriable = kinds.into_iter().collect();
        self
    }

    /// Sets the base interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_rate(mut self, rate: f64) -> Self {
        self.backoff_rate = rate;
        self
    }

    /// Checks the policy's invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_attempts` is zero or the backoff rate is not a
    /// positive finite number. An empty retriable set is valid and never retries.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        let problem = if self.max_attempts == 0 {
            Some("max_attempts must be at least 1".to_string())
        } else if !(self.backoff_rate.is_finite() && self.backoff_rate > 0.0) {
            Some(format!("backoff rate must be positive, got {}", self.backoff_rate))
        } else {
            None
        };

        match problem {
            Some(message) => Err(PipelineValidationError::new(format!("Invalid retry policy: {message}"))
                .with_error_info(ContractErrorInfo::new("CONFIG-RETRY", message))),
            None => Ok(()),
        }
    }

    /// Returns true if failures of this kind may be retried.
    #[must_use]
    pub fn is_retriable(&self, kind: &FailureKind) -> bool {
        self.retriable.contains(kind)
    }

    /// Returns the wait after failed attempt `attempt` (counting from 1).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.interval.as_secs_f64() * self.backoff_rate.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Decides what happens after attempt `attempt` failed with `error`.
    #[must_use]
    pub fn decide(&self, error: &StepError, attempt: u32) -> RetryDecision {
        if !self.is_retriable(&error.kind) {
            RetryDecision::NotRetryable
        } else if attempt >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay_for(attempt))
        }
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// Attempts are exhausted.
    GiveUp,
    /// The failure kind is not retriable.
    NotRetryable,
}

/// Makes a retry decision for a step that may have no policy.
#[must_use]
pub fn should_retry(policy: Option<&RetryPolicy>, error: &StepError, attempt: u32) -> RetryDecision {
    policy.map_or(RetryDecision::GiveUp, |p| p.decide(error, attempt))
}

/// A step that failed after one or more attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// The last failure observed.
    pub error: StepError,
    /// Attempts consumed, including the failing one.
    pub attempts: u32,
}

/// Executes `step` with its retry policy, if any.
///
/// `attempts` is updated as each attempt starts so that a caller that drops
/// this future (on a pipeline deadline) still knows how far the step got.
/// Backoff waits suspend only this future.
pub async fn execute_with_retry(
    executor: &StepExecutor,
    step: &StepDefinition,
    ctx: &ExecutionContext,
    run: &RunIdentity,
    events: &dyn EventSink,
    attempts: &mut u32,
) -> Result<serde_json::Value, StepFailure> {
    let mut attempt = 1;

    loop {
        *attempts = attempt;
        let error = match executor
            .execute(step, ctx, StepAttempt { run_id: run.run_id, attempt })
            .await
        {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match should_retry(step.retry.as_ref(), &error, attempt) {
            RetryDecision::Retry(delay) => {
                warn!(
                    step = %step.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    kind = %error.kind,
                    error = %error.message,
                    "Retrying step after error"
                );
                events.emit(
                    PipelineEvent::new(EventKind::StepRetrying, run.run_id, &run.pipeline)
                        .with_step(&step.name)
                        .with_attempt(attempt)
                        .with_data(serde_json::json!({
                            "kind": error.kind,
                            "error": error.message,
                            "delay_ms": delay.as_millis() as u64,
                        })),
                )
                .await;
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                return Err(StepFailure {
                    error,
                    attempts: attempt,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::ScriptedTarget;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_retriable([FailureKind::TaskFailed])
            .with_interval(Duration::from_secs(10))
            .with_max_attempts(2)
            .with_backoff_rate(2.0)
    }

    #[test]
    fn test_retry_policy_default() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 2);
        assert_eq!(p.interval, Duration::from_secs(10));
        assert!(p.is_retriable(&FailureKind::TaskFailed));
        assert!(p.is_retriable(&FailureKind::Timeout));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let p = RetryPolicy::new()
            .with_interval(Duration::from_millis(100))
            .with_backoff_rate(2.0);

        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_with_fractional_rate() {
        let p = RetryPolicy::new()
            .with_interval(Duration::from_secs(8))
            .with_backoff_rate(0.5);
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_saturates() {
        let p = RetryPolicy::new().with_backoff_rate(1e300);
        assert_eq!(p.delay_for(10), Duration::MAX);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        for bad in [
            policy().with_max_attempts(0),
            policy().with_backoff_rate(0.0),
            policy().with_backoff_rate(f64::NAN),
        ] {
            let err = bad.validate().unwrap_err();
            assert_eq!(err.code(), Some("CONFIG-RETRY"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_retriable_set_never_retries() {
        let never = policy().with_retriable(Vec::new());
        assert!(never.validate().is_ok());

        let target = Arc::new(ScriptedTarget::new(vec![
            Err(StepError::task_failed("boom")),
            Ok(json!({"ok": true})),
        ]));
        let step = StepDefinition::new("fetch", "strip", target.clone()).with_retry(never);
        let events = CollectingEventSink::new();

        let (result, attempts) = run_step(&step, &events).await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(attempts, 1);
        assert_eq!(target.call_count(), 1);
        assert!(events.is_empty());
    }

    #[test]
    fn test_decide() {
        let p = policy();
        let failed = StepError::task_failed("boom");

        assert_eq!(p.decide(&failed, 1), RetryDecision::Retry(Duration::from_secs(10)));
        assert_eq!(p.decide(&failed, 2), RetryDecision::GiveUp);
        assert_eq!(p.decide(&StepError::timeout("slow"), 1), RetryDecision::NotRetryable);
        assert_eq!(should_retry(None, &failed, 1), RetryDecision::GiveUp);
    }

    async fn run_step(
        step: &StepDefinition,
        events: &CollectingEventSink,
    ) -> (Result<serde_json::Value, StepFailure>, u32) {
        let mut attempts = 0;
        let run = RunIdentity::manual("test");
        let result = execute_with_retry(
            &StepExecutor::new(),
            step,
            &ExecutionContext::new(),
            &run,
            events,
            &mut attempts,
        )
        .await;
        (result, attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_once_then_succeed_waits_one_interval() {
        let target = Arc::new(ScriptedTarget::new(vec![
            Err(StepError::task_failed("flaky")),
            Ok(json!({"ok": true})),
        ]));
        let step = StepDefinition::new("fetch", "strip", target.clone()).with_retry(policy());
        let events = CollectingEventSink::new();

        let started = tokio::time::Instant::now();
        let (result, attempts) = run_step(&step, &events).await;

        assert_eq!(result.unwrap(), json!({"ok": true}));
        assert_eq!(attempts, 2);
        assert_eq!(target.call_count(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(events.kinds(), vec!["step.retrying"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_twice_exhausts_attempts() {
        let target = Arc::new(ScriptedTarget::new(vec![
            Err(StepError::task_failed("first")),
            Err(StepError::task_failed("second")),
        ]));
        let step = StepDefinition::new("fetch", "strip", target.clone()).with_retry(policy());

        let (result, _) = run_step(&step, &CollectingEventSink::new()).await;
        let failure = result.unwrap_err();

        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.error.message, "second");
        assert_eq!(target.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retriable_kind_fails_on_first_attempt() {
        let target = Arc::new(ScriptedTarget::new(vec![Err(StepError::new(
            FailureKind::Other("Forbidden".into()),
            "denied",
        ))]));
        let step = StepDefinition::new("fetch", "strip", target.clone())
            .with_retry(policy().with_max_attempts(5));

        let started = tokio::time::Instant::now();
        let (result, _) = run_step(&step, &CollectingEventSink::new()).await;
        let failure = result.unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(target.call_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sequence_over_three_retries() {
        let target = Arc::new(ScriptedTarget::new(vec![
            Err(StepError::task_failed("1")),
            Err(StepError::task_failed("2")),
            Err(StepError::task_failed("3")),
            Ok(json!(4)),
        ]));
        let step = StepDefinition::new("fetch", "strip", target)
            .with_retry(policy().with_max_attempts(4).with_interval(Duration::from_secs(1)));
        let events = CollectingEventSink::new();

        let started = tokio::time::Instant::now();
        let (result, attempts) = run_step(&step, &events).await;

        assert_eq!(result.unwrap(), json!(4));
        assert_eq!(attempts, 4);
        // 1 + 2 + 4
        assert_eq!(started.elapsed(), Duration::from_secs(7));
        let delays: Vec<_> = events
            .events()
            .iter()
            .map(|e| e.data.as_ref().unwrap()["delay_ms"].as_u64().unwrap())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000]);
    }

    #[tokio::test]
    async fn test_without_policy_single_attempt() {
        let target = Arc::new(ScriptedTarget::new(vec![Err(StepError::task_failed("once"))]));
        let step = StepDefinition::new("fetch", "strip", target.clone());

        let (result, attempts) = run_step(&step, &CollectingEventSink::new()).await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(attempts, 1);
        assert_eq!(target.call_count(), 1);
    }
}
