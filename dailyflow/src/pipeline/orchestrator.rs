//! Sequential pipeline orchestrator.
//!
//! Runs the steps of a [`PipelineDefinition`] strictly in order, threading each
//! result into the run's [`ExecutionContext`] and bounding the whole run by
//! the pipeline timeout.

use super::outcome::{FailureScope, RunFailure, RunOutcome, RunSuccess};
use super::retry::{execute_with_retry, StepFailure};
use super::PipelineDefinition;
use crate::context::{ExecutionContext, RunIdentity};
use crate::core::{FailureKind, RunState, StepError};
use crate::events::{EventKind, EventSink, NoOpEventSink, PipelineEvent};
use crate::steps::StepExecutor;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Mutable bookkeeping for one run. Lives outside the step future so that it
/// survives the future being dropped on a pipeline timeout.
#[derive(Debug, Default)]
struct RunProgress {
    state: RunState,
    attempts: u32,
    context: ExecutionContext,
    completed: Vec<String>,
}

impl RunProgress {
    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }
}

/// Executes runs of one pipeline definition.
///
/// Each call to [`Orchestrator::run`] is an independent run with its own
/// context; concurrent runs share nothing but the definition.
#[derive(Clone)]
pub struct Orchestrator {
    definition: Arc<PipelineDefinition>,
    executor: StepExecutor,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipeline", &self.definition.name())
            .field("steps", &self.definition.step_count())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator for a validated definition.
    #[must_use]
    pub fn new(definition: PipelineDefinition) -> Self {
        Self {
            definition: Arc::new(definition),
            executor: StepExecutor::new(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the pipeline definition.
    #[must_use]
    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.events)
    }

    /// Starts a manual run and waits for its outcome.
    pub async fn run(&self) -> RunOutcome {
        self.run_with(RunIdentity::manual(self.definition.name())).await
    }

    /// Runs the pipeline under the given identity.
    pub async fn run_with(&self, identity: RunIdentity) -> RunOutcome {
        let span = info_span!(
            "pipeline_run",
            pipeline = %self.definition.name(),
            run_id = %identity.run_id,
            trigger = %identity.trigger,
        );
        self.execute(identity).instrument(span).await
    }

    async fn execute(&self, identity: RunIdentity) -> RunOutcome {
        let started = Instant::now();
        let timeout = self.definition.timeout();
        let mut progress = RunProgress::default();

        info!(steps = self.definition.step_count(), timeout_ms = timeout.as_millis() as u64, "Run started");
        self.emit(PipelineEvent::new(EventKind::RunStarted, identity.run_id, &identity.pipeline)).await;

        let result = tokio::time::timeout(timeout, self.drive(&identity, &mut progress)).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let failure = match result {
            Ok(Ok(())) => {
                progress.advance(RunState::Succeeded);
                info!(duration_ms, "Run succeeded");
                self.emit(
                    PipelineEvent::new(EventKind::RunSucceeded, identity.run_id, &identity.pipeline)
                        .with_data(serde_json::json!({ "duration_ms": duration_ms })),
                )
                .await;
                return RunOutcome::Succeeded(RunSuccess {
                    identity,
                    context: progress.context,
                    duration_ms,
                });
            }
            Ok(Err((step_index, failure))) => (step_index, failure, FailureScope::Step),
            Err(_) => {
                // Abandon the in-flight step; its result, if any, is discarded.
                let step_index = progress.state.step_index().unwrap_or(0);
                let failure = StepFailure {
                    error: StepError::timeout(format!("pipeline timeout of {timeout:?} exceeded")),
                    attempts: progress.attempts,
                };
                (step_index, failure, FailureScope::Pipeline)
            }
        };

        let (step_index, StepFailure { error, attempts }, scope) = failure;
        let step = self.definition.steps()[step_index].name.clone();
        progress.advance(RunState::Failed);

        warn!(
            step = %step,
            kind = %error.kind,
            attempts,
            scope = ?scope,
            error = %error.message,
            duration_ms,
            "Run failed"
        );
        self.emit(
            PipelineEvent::new(EventKind::RunFailed, identity.run_id, &identity.pipeline)
                .with_step(&step)
                .with_attempt(attempts)
                .with_data(serde_json::json!({
                    "kind": error.kind,
                    "error": error.message,
                    "scope": scope,
                    "duration_ms": duration_ms,
                })),
        )
        .await;

        RunOutcome::Failed(RunFailure {
            identity,
            step,
            step_index,
            kind: error.kind,
            attempts,
            message: error.message,
            scope,
            completed_steps: progress.completed,
            duration_ms,
        })
    }

    /// Walks the steps in order. Returns the index and failure of the first
    /// step that fails terminally.
    async fn drive(
        &self,
        identity: &RunIdentity,
        progress: &mut RunProgress,
    ) -> Result<(), (usize, StepFailure)> {
        for (index, step) in self.definition.steps().iter().enumerate() {
            progress.advance(RunState::Running(index));
            progress.attempts = 0;
            let step_started = Instant::now();

            self.emit(
                PipelineEvent::new(EventKind::StepStarted, identity.run_id, &identity.pipeline)
                    .with_step(&step.name),
            )
            .await;

            let result = execute_with_retry(
                &self.executor,
                step,
                &progress.context,
                identity,
                self.events.as_ref(),
                &mut progress.attempts,
            )
            .await;

            let value = match result {
                Ok(value) => value,
                Err(failure) => {
                    self.emit(
                        PipelineEvent::new(EventKind::StepFailed, identity.run_id, &identity.pipeline)
                            .with_step(&step.name)
                            .with_attempt(failure.attempts)
                            .with_data(serde_json::json!({
                                "kind": failure.error.kind,
                                "error": failure.error.message,
                            })),
                    )
                    .await;
                    return Err((index, failure));
                }
            };

            if let Err(conflict) = progress.context.insert(&step.result_field, value) {
                return Err((
                    index,
                    StepFailure {
                        error: StepError::new(FailureKind::ConfigurationError, conflict.to_string()),
                        attempts: progress.attempts,
                    },
                ));
            }
            progress.completed.push(step.name.clone());

            let duration_ms = step_started.elapsed().as_secs_f64() * 1000.0;
            info!(step = %step.name, field = %step.result_field, attempts = progress.attempts, duration_ms, "Step completed");
            self.emit(
                PipelineEvent::new(EventKind::StepCompleted, identity.run_id, &identity.pipeline)
                    .with_step(&step.name)
                    .with_attempt(progress.attempts)
                    .with_data(serde_json::json!({
                        "field": step.result_field,
                        "duration_ms": duration_ms,
                    })),
            )
            .await;
        }

        Ok(())
    }

    async fn emit(&self, event: PipelineEvent) {
        self.events.emit(event).await;
    }
}
