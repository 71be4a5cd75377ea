//! Run identity for tracking pipeline executions.

use crate::core::TriggerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this run.
    pub run_id: Uuid,
    /// The pipeline the run belongs to.
    pub pipeline: String,
    /// What started the run.
    pub trigger: TriggerKind,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates an identity for a manually started run.
    #[must_use]
    pub fn manual(pipeline: impl Into<String>) -> Self {
        Self::new(pipeline, TriggerKind::Manual)
    }

    /// Creates an identity for a run fired by the scheduler.
    #[must_use]
    pub fn scheduled(pipeline: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(pipeline, TriggerKind::Scheduled { at })
    }

    /// Creates a new run identity with a time-ordered run ID.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, trigger: TriggerKind) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            pipeline: pipeline.into(),
            trigger,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunIdentity::manual("feed");
        let b = RunIdentity::manual("feed");
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.trigger, TriggerKind::Manual);
    }

    #[test]
    fn test_scheduled_identity_keeps_tick() {
        let at = Utc::now();
        let identity = RunIdentity::scheduled("feed", at);
        assert_eq!(identity.trigger, TriggerKind::Scheduled { at });
        assert_eq!(identity.pipeline, "feed");
    }
}
