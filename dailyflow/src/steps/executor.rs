//! Single-attempt step execution with a per-step deadline.

use super::StepRequest;
use crate::context::ExecutionContext;
use crate::core::StepError;
use crate::pipeline::StepDefinition;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Identifies one attempt of one step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepAttempt {
    /// The run ID.
    pub run_id: Uuid,
    /// The attempt number, counting from 1.
    pub attempt: u32,
}

/// Invokes a step's target exactly once per call and enforces its timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepExecutor;

impl StepExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the request payload for a step from the current context.
    #[must_use]
    pub fn request(step: &StepDefinition, ctx: &ExecutionContext, attempt: StepAttempt) -> StepRequest {
        StepRequest {
            run_id: attempt.run_id,
            step: step.name.clone(),
            attempt: attempt.attempt,
            input: ctx.last().cloned(),
            context: ctx.to_map(),
            parameters: step.parameters.clone(),
        }
    }

    /// Executes one attempt of `step`.
    ///
    /// A target that does not answer within the step timeout fails with
    /// `Timeout`; its in-flight invocation is dropped. Any other failure is
    /// returned with the classification the target gave it.
    pub async fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
        attempt: StepAttempt,
    ) -> Result<serde_json::Value, StepError> {
        let request = Self::request(step, ctx, attempt);
        let started = Instant::now();

        debug!(
            step = %step.name,
            attempt = attempt.attempt,
            timeout_ms = step.timeout.as_millis() as u64,
            "Invoking step target"
        );

        let result = match tokio::time::timeout(step.timeout, step.target.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::timeout(format!(
                "step '{}' did not respond within {:?}",
                step.name, step.timeout
            ))),
        };

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => debug!(step = %step.name, attempt = attempt.attempt, duration_ms, "Step attempt succeeded"),
            Err(e) => debug!(
                step = %step.name,
                attempt = attempt.attempt,
                duration_ms,
                kind = %e.kind,
                error = %e.message,
                "Step attempt failed"
            ),
        }

        result
    }
}
