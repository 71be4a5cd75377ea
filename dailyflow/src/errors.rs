//! Error types for the dailyflow orchestrator.
//!
//! Configuration problems are reported as [`PipelineValidationError`] when a
//! pipeline is built. Nothing in this module is raised by a running pipeline:
//! step failures are values ([`crate::core::StepError`]) that end up in a
//! [`crate::pipeline::RunOutcome`].

use crate::core::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for dailyflow operations.
#[derive(Debug, Error)]
pub enum DailyflowError {
    /// A pipeline definition failed validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A result field was written twice into an execution context.
    #[error("{0}")]
    DataConflict(#[from] DataConflictError),

    /// An artifact store operation failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONFIG-DUP_FIELD").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition is invalid.
///
/// This is the `ConfigurationError` failure kind: it is produced while the
/// pipeline is being constructed and prevents any run from starting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The steps involved in the error.
    pub steps: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            steps: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the steps involved.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the failure kind this error maps to.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        FailureKind::ConfigurationError
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when writing a result field that already exists in a context.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Data conflict: field '{field}' already exists")]
pub struct DataConflictError {
    /// The conflicting field.
    pub field: String,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// Errors raised by artifact stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is not a valid relative object key.
    #[error("Invalid artifact key: {key}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// The underlying storage failed.
    #[error("Artifact store IO error for '{key}': {source}")]
    Io {
        /// The key being accessed.
        key: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Creates an invalid key error.
    #[must_use]
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Wraps an IO error for a key.
    #[must_use]
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Provides default suggestions for configuration error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONFIG-EMPTY" => Some("Add at least one step to the pipeline before building."),
            "CONFIG-DUP_STEP" => Some("Step names must be unique within a pipeline. Rename one of the steps."),
            "CONFIG-DUP_FIELD" => Some(
                "Each step writes its result under its own field. \
                 Give every step a distinct result field.",
            ),
            "CONFIG-RETRY" => Some(
                "Retry policies need max_attempts >= 1, a positive backoff rate \
                 and at least one retriable failure kind.",
            ),
            "CONFIG-TIMEOUT" => Some("Timeouts must be greater than zero."),
            "CONFIG-NAME" => Some(
                "Step names start with a letter; result fields are identifiers \
                 made of letters, digits and underscores.",
            ),
            "CONFIG-TRIGGER" => Some(
                "Use a daily trigger with hour 0-23 and minute 0-59, or a valid \
                 six or seven field cron expression.",
            ),
            "CONFIG-TARGET" => Some("Step targets need an absolute http or https URL."),
            _ => None,
        }
    }
}
