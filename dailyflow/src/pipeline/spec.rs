//! Step definitions and shared step defaults.

use super::RetryPolicy;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::steps::StepTarget;
use std::sync::Arc;
use std::time::Duration;

/// Step timeout used when neither the step nor its defaults set one.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Named default configuration shared by several steps.
///
/// Defaults are applied explicitly with [`StepDefinition::with_defaults`];
/// nothing reads them implicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefaults {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retry policy attached to steps that opt into retries.
    pub retry: Option<RetryPolicy>,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_STEP_TIMEOUT,
            retry: Some(RetryPolicy::default()),
        }
    }
}

impl StepDefaults {
    /// Creates defaults with the standard timeout and retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the shared retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: Option<RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }
}

/// Immutable configuration of one step.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    /// The step name, unique within its pipeline.
    pub name: String,
    /// Context field the step's result is merged under.
    pub result_field: String,
    /// The external target invoked on every attempt.
    pub target: Arc<dyn StepTarget>,
    /// Retry policy; `None` means a single attempt.
    pub retry: Option<RetryPolicy>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Fixed configuration passed to the target on every attempt.
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl StepDefinition {
    /// Creates a step with the default timeout and no retry.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        result_field: impl Into<String>,
        target: Arc<dyn StepTarget>,
    ) -> Self {
        Self {
            name: name.into(),
            result_field: result_field.into(),
            target,
            retry: None,
            timeout: DEFAULT_STEP_TIMEOUT,
            parameters: serde_json::Map::new(),
        }
    }

    /// Applies shared defaults: their timeout and, if present, their retry policy.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &StepDefaults) -> Self {
        self.timeout = defaults.timeout;
        self.retry.clone_from(&defaults.retry);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches a retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Removes any retry policy.
    #[must_use]
    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Adds a fixed parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Validates the step in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed names, a zero timeout, or an invalid
    /// retry policy.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if !is_step_name(&self.name) {
            return Err(name_error(format!("Invalid step name '{}'", self.name), &self.name));
        }
        if !is_field_name(&self.result_field) {
            return Err(name_error(
                format!(
                    "Step '{}' has invalid result field '{}'",
                    self.name, self.result_field
                ),
                &self.name,
            ));
        }
        if self.timeout.is_zero() {
            return Err(PipelineValidationError::new(format!(
                "Step '{}' has a zero timeout",
                self.name
            ))
            .with_steps(vec![self.name.clone()])
            .with_error_info(ContractErrorInfo::new("CONFIG-TIMEOUT", "Step timeout must be positive")));
        }
        if let Some(policy) = &self.retry {
            policy.validate().map_err(|e| e.with_steps(vec![self.name.clone()]))?;
        }
        Ok(())
    }
}

fn name_error(message: String, step: &str) -> PipelineValidationError {
    PipelineValidationError::new(message)
        .with_steps(vec![step.to_string()])
        .with_error_info(
            ContractErrorInfo::new("CONFIG-NAME", "Malformed step or field name")
                .with_fix_hint("Step names start with a letter; result fields are identifiers."),
        )
}

/// `[A-Za-z][A-Za-z0-9_.-]*`
fn is_step_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
