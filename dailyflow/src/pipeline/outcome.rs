//! Terminal outcome of a pipeline run.

use crate::context::{ExecutionContext, RunIdentity};
use crate::core::{FailureKind, RunState};
use serde::Serialize;

/// Where a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureScope {
    /// The step failed terminally (retries exhausted or non-retriable).
    Step,
    /// The overall pipeline deadline fired while the step was active.
    Pipeline,
}

/// A run in which every step succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct RunSuccess {
    /// The run's identity.
    pub identity: RunIdentity,
    /// One result per step, in declared order.
    pub context: ExecutionContext,
    /// Wall time of the run in milliseconds.
    pub duration_ms: f64,
}

/// A run that stopped at a failing step.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    /// The run's identity.
    pub identity: RunIdentity,
    /// The step that failed, or that was active when the deadline fired.
    pub step: String,
    /// Position of that step in the pipeline.
    pub step_index: usize,
    /// The failure classification.
    pub kind: FailureKind,
    /// Attempts consumed by the failing step.
    pub attempts: u32,
    /// Detail from the last failure.
    pub message: String,
    /// Whether the step or the pipeline deadline ended the run.
    pub scope: FailureScope,
    /// Steps that completed before the failure, for diagnostics only.
    pub completed_steps: Vec<String>,
    /// Wall time of the run in milliseconds.
    pub duration_ms: f64,
}

/// The terminal value of a run, produced exactly once.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step succeeded.
    Succeeded(RunSuccess),
    /// A step failed or the pipeline timed out.
    Failed(RunFailure),
}

impl RunOutcome {
    /// Returns true for a successful run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns the terminal state.
    #[must_use]
    pub fn state(&self) -> RunState {
        match self {
            Self::Succeeded(_) => RunState::Succeeded,
            Self::Failed(_) => RunState::Failed,
        }
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        match self {
            Self::Succeeded(s) => &s.identity,
            Self::Failed(f) => &f.identity,
        }
    }

    /// Returns the final context of a successful run.
    ///
    /// A failed run exposes no context.
    #[must_use]
    pub fn context(&self) -> Option<&ExecutionContext> {
        match self {
            Self::Succeeded(s) => Some(&s.context),
            Self::Failed(_) => None,
        }
    }

    /// Returns the failure of a failed run.
    #[must_use]
    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(f) => Some(f),
        }
    }

    /// Returns the run duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        match self {
            Self::Succeeded(s) => s.duration_ms,
            Self::Failed(f) => f.duration_ms,
        }
    }
}
