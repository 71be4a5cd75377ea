//! JSON pipeline configuration.
//!
//! A [`PipelineConfig`] is the declarative description of one pipeline
//! instance: which steps it has, whether each retries, and when it fires.
//! All validation happens when it is turned into a [`PipelineDefinition`].

use crate::core::FailureKind;
use crate::errors::{ContractErrorInfo, DailyflowError, PipelineValidationError};
use crate::pipeline::{PipelineDefinition, RetryPolicy, StepDefaults, StepDefinition};
use crate::scheduler::Trigger;
use crate::steps::{EchoTarget, StepTarget};
use crate::store::RetentionRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline name.
    pub name: String,
    /// Overall run timeout in seconds.
    #[serde(default = "default_pipeline_timeout")]
    pub timeout_seconds: u64,
    /// When the pipeline fires.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Shared step defaults.
    #[serde(default)]
    pub step_defaults: StepDefaultsConfig,
    /// Steps in execution order.
    pub steps: Vec<StepConfig>,
    /// Local artifact directory used by `serve` for retention.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Retention applied to the local artifact directory.
    #[serde(default)]
    pub retention: Option<RetentionRule>,
}

/// Schedule: a daily UTC time or a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleConfig {
    /// `{"cron": "0 0 8 * * *"}`
    Cron {
        /// Cron expression with a seconds field.
        cron: String,
    },
    /// `{"hour": 8, "minute": 0}`
    Daily {
        /// Hour of day, UTC.
        hour: u32,
        /// Minute of hour.
        #[serde(default)]
        minute: u32,
    },
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::Daily { hour: 8, minute: 0 }
    }
}

/// Retry policy as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retriable failure kinds. Defaults to `TaskFailed` and `Timeout`, the
    /// same set as [`RetryPolicy::default`].
    #[serde(default = "default_retry_errors")]
    pub errors: Vec<FailureKind>,
    /// Base interval in seconds.
    #[serde(default = "default_retry_interval")]
    pub interval_seconds: f64,
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff multiplier.
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            errors: default_retry_errors(),
            interval_seconds: default_retry_interval(),
            max_attempts: default_max_attempts(),
            backoff_rate: default_backoff_rate(),
        }
    }
}

impl RetryConfig {
    fn to_policy(&self) -> Result<RetryPolicy, PipelineValidationError> {
        let interval = Duration::try_from_secs_f64(self.interval_seconds).map_err(|e| {
            PipelineValidationError::new(format!(
                "Invalid retry interval {}: {e}",
                self.interval_seconds
            ))
            .with_error_info(ContractErrorInfo::new("CONFIG-RETRY", "Retry interval out of range"))
        })?;

        let policy = RetryPolicy::new()
            .with_retriable(self.errors.iter().cloned())
            .with_interval(interval)
            .with_max_attempts(self.max_attempts)
            .with_backoff_rate(self.backoff_rate);
        policy.validate()?;
        Ok(policy)
    }
}

/// Named defaults shared by every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefaultsConfig {
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_step_timeout")]
    pub timeout_seconds: u64,
    /// Shared retry policy; `null` disables retries by default.
    #[serde(default = "default_shared_retry")]
    pub retry: Option<RetryConfig>,
}

impl Default for StepDefaultsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_step_timeout(),
            retry: default_shared_retry(),
        }
    }
}

/// Per-step retry setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrySetting {
    /// `true` uses the shared policy, `false` disables retries.
    Enabled(bool),
    /// An explicit policy for this step.
    Policy(RetryConfig),
}

/// The external target of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetConfig {
    /// POST the step request as JSON.
    Http {
        /// Endpoint URL.
        url: String,
    },
    /// GET a liveness endpoint.
    Heartbeat {
        /// Endpoint URL.
        url: String,
    },
    /// Return the request input unchanged.
    Echo,
}

impl TargetConfig {
    fn build(&self, step: &str) -> Result<Arc<dyn StepTarget>, PipelineValidationError> {
        match self {
            Self::Echo => Ok(Arc::new(EchoTarget)),
            #[cfg(feature = "http")]
            Self::Http { url } => crate::steps::HttpTarget::new(url)
                .map(|t| Arc::new(t) as Arc<dyn StepTarget>)
                .map_err(|e| e.with_steps(vec![step.to_string()])),
            #[cfg(feature = "http")]
            Self::Heartbeat { url } => crate::steps::HeartbeatTarget::new(url)
                .map(|t| Arc::new(t) as Arc<dyn StepTarget>)
                .map_err(|e| e.with_steps(vec![step.to_string()])),
            #[cfg(not(feature = "http"))]
            Self::Http { .. } | Self::Heartbeat { .. } => Err(PipelineValidationError::new(
                format!("Step '{step}' needs the `http` feature"),
            )
            .with_steps(vec![step.to_string()])
            .with_error_info(ContractErrorInfo::new(
                "CONFIG-TARGET",
                "HTTP targets are not compiled in",
            ))),
        }
    }
}

/// One step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Step name.
    pub name: String,
    /// Context field for the step's result.
    pub result_field: String,
    /// What the step invokes.
    pub target: TargetConfig,
    /// Overrides the shared timeout.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Overrides the shared retry policy.
    #[serde(default)]
    pub retry: Option<RetrySetting>,
    /// Fixed configuration passed to the target.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl PipelineConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has unknown fields.
    pub fn from_json(json: &str) -> Result<Self, DailyflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DailyflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DailyflowError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            DailyflowError::Config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Builds the trigger.
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range time or a bad cron expression.
    pub fn trigger(&self) -> Result<Trigger, PipelineValidationError> {
        match &self.schedule {
            ScheduleConfig::Daily { hour, minute } => Trigger::daily(*hour, *minute),
            ScheduleConfig::Cron { cron } => Trigger::cron(cron),
        }
    }

    /// Resolves the shared defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared retry policy is invalid.
    pub fn defaults(&self) -> Result<StepDefaults, PipelineValidationError> {
        let retry = self
            .step_defaults
            .retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .transpose()?;
        Ok(StepDefaults::new()
            .with_timeout(Duration::from_secs(self.step_defaults.timeout_seconds))
            .with_retry(retry))
    }

    /// Builds a validated pipeline definition.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any invalid step, duplicate name or
    /// field, bad target URL, or empty step list.
    pub fn into_definition(self) -> Result<PipelineDefinition, PipelineValidationError> {
        let defaults = self.defaults()?;
        let mut steps = Vec::with_capacity(self.steps.len());

        for step in self.steps {
            let target = step.target.build(&step.name)?;
            let mut definition =
                StepDefinition::new(step.name.clone(), step.result_field, target).with_defaults(&defaults);

            if let Some(seconds) = step.timeout_seconds {
                definition = definition.with_timeout(Duration::from_secs(seconds));
            }

            definition = match step.retry {
                None => definition,
                Some(RetrySetting::Enabled(false)) => definition.without_retry(),
                Some(RetrySetting::Enabled(true)) => {
                    let policy = defaults.retry.clone().map_or_else(
                        || RetryConfig::default().to_policy(),
                        Ok,
                    )?;
                    definition.with_retry(policy)
                }
                Some(RetrySetting::Policy(config)) => definition.with_retry(
                    config
                        .to_policy()
                        .map_err(|e| e.with_steps(vec![step.name.clone()]))?,
                ),
            };

            definition.parameters = step.parameters;
            steps.push(definition);
        }

        PipelineDefinition::new(self.name, steps, Duration::from_secs(self.timeout_seconds))
    }
}

const fn default_pipeline_timeout() -> u64 {
    15 * 60
}

const fn default_step_timeout() -> u64 {
    10
}

fn default_retry_errors() -> Vec<FailureKind> {
    vec![FailureKind::TaskFailed, FailureKind::Timeout]
}

const fn default_retry_interval() -> f64 {
    10.0
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_backoff_rate() -> f64 {
    2.0
}

#[allow(clippy::unnecessary_wraps)]
fn default_shared_retry() -> Option<RetryConfig> {
    Some(RetryConfig::default())
}
