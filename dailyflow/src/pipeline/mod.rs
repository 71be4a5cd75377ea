//! Pipeline definition and execution.
//!
//! This module provides:
//! - Step definitions and shared step defaults
//! - A validating pipeline builder
//! - Bounded exponential-backoff retry
//! - The sequential orchestrator and its run outcomes

mod builder;
mod orchestrator;
mod outcome;
mod retry;
mod spec;

#[cfg(test)]
mod integration_tests;

pub use builder::{PipelineBuilder, PipelineDefinition, DEFAULT_PIPELINE_TIMEOUT};
pub use orchestrator::Orchestrator;
pub use outcome::{FailureScope, RunFailure, RunOutcome, RunSuccess};
pub use retry::{execute_with_retry, should_retry, RetryDecision, RetryPolicy, StepFailure};
pub use spec::{StepDefaults, StepDefinition, DEFAULT_STEP_TIMEOUT};
