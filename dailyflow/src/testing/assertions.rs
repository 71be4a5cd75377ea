//! Test assertions for run outcomes.

use crate::core::FailureKind;
use crate::pipeline::{RunFailure, RunOutcome};

/// Asserts that the run succeeded.
pub fn assert_run_succeeded(outcome: &RunOutcome) {
    assert!(
        outcome.is_success(),
        "Expected success, got failure: {:?}",
        outcome.failure()
    );
}

/// Asserts that the run failed and returns the failure.
pub fn assert_run_failed(outcome: &RunOutcome) -> &RunFailure {
    match outcome.failure() {
        Some(failure) => failure,
        None => panic!("Expected failure, got success: {:?}", outcome.context()),
    }
}

/// Asserts that the run failed at `step` with `kind`.
pub fn assert_failed_at(outcome: &RunOutcome, step: &str, kind: &FailureKind) {
    let failure = assert_run_failed(outcome);
    assert_eq!(
        failure.step, step,
        "Expected failure at step '{}', got '{}'",
        step, failure.step
    );
    assert_eq!(
        &failure.kind, kind,
        "Expected failure kind {}, got {}",
        kind, failure.kind
    );
}

/// Asserts that a successful run's context has exactly these fields, in order.
pub fn assert_context_fields(outcome: &RunOutcome, expected: &[&str]) {
    assert_run_succeeded(outcome);
    let fields: Vec<&str> = outcome
        .context()
        .map(|ctx| ctx.fields().collect())
        .unwrap_or_default();
    assert_eq!(fields, expected, "Context fields differ");
}

/// Asserts that a successful run's context holds `expected` under `field`.
pub fn assert_context_value(outcome: &RunOutcome, field: &str, expected: &serde_json::Value) {
    let actual = outcome.context().and_then(|ctx| ctx.get(field));
    assert_eq!(
        actual,
        Some(expected),
        "Expected value {:?} for field '{}', got {:?}",
        expected,
        field,
        actual
    );
}
