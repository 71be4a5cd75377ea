//! Failure classification for step invocations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a step or run failure.
///
/// Retry policies decide eligibility by kind. Kinds serialize as their bare
/// name, so a retriable set reads `["TaskFailed", "Timeout"]` in config files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureKind {
    /// The external step reported an error.
    TaskFailed,
    /// A step or pipeline deadline was exceeded.
    Timeout,
    /// The pipeline definition was invalid.
    ConfigurationError,
    /// A target-specific classification.
    Other(String),
}

impl FailureKind {
    /// Returns the kind's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TaskFailed => "TaskFailed",
            Self::Timeout => "Timeout",
            Self::ConfigurationError => "ConfigurationError",
            Self::Other(name) => name,
        }
    }
}

impl Default for FailureKind {
    fn default() -> Self {
        Self::TaskFailed
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FailureKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "TaskFailed" => Self::TaskFailed,
            "Timeout" => Self::Timeout,
            "ConfigurationError" => Self::ConfigurationError,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for FailureKind {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<FailureKind> for String {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for FailureKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// A typed failure returned by a step target or produced by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    /// The failure classification.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

impl StepError {
    /// Creates a step error of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `TaskFailed` error, the default classification.
    #[must_use]
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TaskFailed, message)
    }

    /// Creates a `Timeout` error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StepError {}
