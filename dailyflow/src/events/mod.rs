//! Lifecycle events for observability.
//!
//! Runs report their progress as [`PipelineEvent`]s to an [`EventSink`]
//! passed in at construction. There is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The type of a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A run entered `Running(0)`.
    #[serde(rename = "run.started")]
    RunStarted,
    /// A step was entered and its first attempt is about to run.
    #[serde(rename = "step.started")]
    StepStarted,
    /// A step attempt failed and will be retried after a backoff.
    #[serde(rename = "step.retrying")]
    StepRetrying,
    /// A step succeeded and its result was merged.
    #[serde(rename = "step.completed")]
    StepCompleted,
    /// A step failed terminally.
    #[serde(rename = "step.failed")]
    StepFailed,
    /// A run reached `Succeeded`.
    #[serde(rename = "run.succeeded")]
    RunSucceeded,
    /// A run reached `Failed`.
    #[serde(rename = "run.failed")]
    RunFailed,
    /// The scheduler fired a tick.
    #[serde(rename = "schedule.fired")]
    ScheduleFired,
}

impl EventKind {
    /// Returns the dotted event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStarted => "run.started",
            Self::StepStarted => "step.started",
            Self::StepRetrying => "step.retrying",
            Self::StepCompleted => "step.completed",
            Self::StepFailed => "step.failed",
            Self::RunSucceeded => "run.succeeded",
            Self::RunFailed => "run.failed",
            Self::ScheduleFired => "schedule.fired",
        }
    }

    /// Returns true for events that report a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::StepFailed | Self::RunFailed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// What happened.
    pub kind: EventKind,
    /// The run the event belongs to.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// The step involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// The attempt number, counting from 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Event-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(kind: EventKind, run_id: Uuid, pipeline: impl Into<String>) -> Self {
        Self {
            kind,
            run_id,
            pipeline: pipeline.into(),
            step: None,
            attempt: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the step name.
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Sets the attempt number.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names_match_serde() {
        for kind in [
            EventKind::RunStarted,
            EventKind::StepRetrying,
            EventKind::RunFailed,
            EventKind::ScheduleFired,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_event_builder() {
        let event = PipelineEvent::new(EventKind::StepRetrying, Uuid::nil(), "feed")
            .with_step("fetch")
            .with_attempt(1)
            .with_data(serde_json::json!({"delay_ms": 10}));

        assert_eq!(event.step.as_deref(), Some("fetch"));
        assert_eq!(event.attempt, Some(1));
        assert!(!event.kind.is_failure());
    }
}
