//! Run state and trigger kind enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a single pipeline run.
///
/// `NotStarted -> Running(0) -> ... -> Running(n-1) -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "step_index")]
pub enum RunState {
    /// The run has been created but no step has been entered.
    NotStarted,
    /// The step at this index is executing (including its retries).
    Running(usize),
    /// Every step succeeded.
    Succeeded,
    /// A step failed terminally or the pipeline timed out.
    Failed,
}

impl Default for RunState {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running(index) => write!(f, "running({index})"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl RunState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns the active step index, if running.
    #[must_use]
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::Running(index) => Some(*index),
            _ => None,
        }
    }

    /// Returns true if moving to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::Running(0)) => true,
            (Self::Running(i), Self::Running(j)) => j == i + 1,
            (Self::Running(_), Self::Succeeded | Self::Failed) => true,
            _ => false,
        }
    }
}

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TriggerKind {
    /// Fired by the scheduler for the given tick.
    Scheduled {
        /// The tick the run was scheduled for.
        at: DateTime<Utc>,
    },
    /// Started directly by a caller.
    Manual,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled { at } => write!(f, "scheduled@{}", at.to_rfc3339()),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::NotStarted.to_string(), "not_started");
        assert_eq!(RunState::Running(2).to_string(), "running(2)");
        assert_eq!(RunState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_run_state_transitions() {
        assert!(RunState::NotStarted.can_transition_to(RunState::Running(0)));
        assert!(!RunState::NotStarted.can_transition_to(RunState::Running(1)));
        assert!(!RunState::NotStarted.can_transition_to(RunState::Succeeded));
        assert!(RunState::Running(0).can_transition_to(RunState::Running(1)));
        assert!(!RunState::Running(1).can_transition_to(RunState::Running(0)));
        assert!(RunState::Running(1).can_transition_to(RunState::Failed));
        assert!(!RunState::Succeeded.can_transition_to(RunState::Failed));
        assert!(!RunState::Failed.can_transition_to(RunState::Running(0)));
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running(0).is_terminal());
        assert_eq!(RunState::Running(3).step_index(), Some(3));
    }

    #[test]
    fn test_run_state_serialize() {
        let json = serde_json::to_string(&RunState::Running(1)).unwrap();
        assert_eq!(json, r#"{"state":"running","step_index":1}"#);
    }
}
