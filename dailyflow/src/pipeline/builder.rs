//! Pipeline definition and its validating builder.

use super::StepDefinition;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use std::time::Duration;

/// Overall run timeout used when none is configured.
pub const DEFAULT_PIPELINE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// A validated, ordered sequence of steps plus an overall timeout.
///
/// Step order is fixed here and never changes at run time.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    steps: Vec<StepDefinition>,
    timeout: Duration,
}

impl PipelineDefinition {
    /// Validates and creates a definition.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty step list, duplicate step
    /// names or result fields, invalid steps, or a zero timeout.
    pub fn new(
        name: impl Into<String>,
        steps: Vec<StepDefinition>,
        timeout: Duration,
    ) -> Result<Self, PipelineValidationError> {
        let mut builder = PipelineBuilder::new(name).with_timeout(timeout);
        for step in steps {
            builder.add_step(step)?;
        }
        builder.build()
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the overall run timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for creating validated pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    steps: Vec<StepDefinition>,
    timeout: Duration,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            timeout: DEFAULT_PIPELINE_TIMEOUT,
        }
    }

    /// Sets the overall run timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Appends a step.
    ///
    /// # Errors
    ///
    /// Returns an error if the step is invalid or reuses a step name or
    /// result field.
    pub fn step(mut self, step: StepDefinition) -> Result<Self, PipelineValidationError> {
        self.add_step(step)?;
        Ok(self)
    }

    /// Appends a step in place.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_step(&mut self, step: StepDefinition) -> Result<(), PipelineValidationError> {
        step.validate()?;

        if let Some(existing) = self.steps.iter().find(|s| s.name == step.name) {
            return Err(PipelineValidationError::new(format!(
                "Duplicate step name '{}'",
                existing.name
            ))
            .with_steps(vec![existing.name.clone()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-DUP_STEP", format!("Step '{}' is defined twice", step.name))
                    .with_fix_hint("Rename one of the steps."),
            ));
        }

        if let Some(existing) = self.steps.iter().find(|s| s.result_field == step.result_field) {
            return Err(PipelineValidationError::new(format!(
                "Steps '{}' and '{}' both write result field '{}'",
                existing.name, step.name, step.result_field
            ))
            .with_steps(vec![existing.name.clone(), step.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONFIG-DUP_FIELD",
                    format!("Result field '{}' is not unique", step.result_field),
                )
                .with_context_entry("field", step.result_field.clone())
                .with_fix_hint("Give every step a distinct result field."),
            ));
        }

        self.steps.push(step);
        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no steps or the timeout is zero.
    pub fn build(self) -> Result<PipelineDefinition, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("Pipeline name cannot be empty or whitespace-only")
                .with_error_info(ContractErrorInfo::new("CONFIG-NAME", "Pipeline name is empty")));
        }

        if self.steps.is_empty() {
            return Err(PipelineValidationError::new(format!("Pipeline '{}' has no steps", self.name))
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one step to the pipeline before building."),
                ));
        }

        if self.timeout.is_zero() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has a zero timeout",
                self.name
            ))
            .with_error_info(ContractErrorInfo::new("CONFIG-TIMEOUT", "Pipeline timeout must be positive")));
        }

        Ok(PipelineDefinition {
            name: self.name,
            steps: self.steps,
            timeout: self.timeout,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of steps added so far.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}
