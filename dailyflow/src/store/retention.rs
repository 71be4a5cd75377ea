//! Time-boxed retention on a key prefix.

use super::ArtifactStore;
use crate::errors::StoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Retention window in days used when none is configured.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Objects under `prefix` are purged once older than `max_age`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionRule {
    /// Key prefix the rule applies to, e.g. `strips/`.
    pub prefix: String,
    /// Maximum object age.
    #[serde(with = "duration_days")]
    pub max_age: Duration,
}

impl RetentionRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(prefix: impl Into<String>, max_age: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            max_age,
        }
    }

    /// Creates a rule with the default 30 day window.
    #[must_use]
    pub fn with_default_window(prefix: impl Into<String>) -> Self {
        Self::new(prefix, Duration::days(DEFAULT_RETENTION_DAYS))
    }

    /// Returns true if an object modified at `modified` has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - modified > self.max_age
    }
}

/// Deletes every object under the rule's prefix that has expired at `now`.
/// Returns the deleted keys.
///
/// # Errors
///
/// Returns the first store error encountered.
pub async fn purge_expired(
    store: &dyn ArtifactStore,
    rule: &RetentionRule,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StoreError> {
    let mut purged = Vec::new();

    for object in store.list(&rule.prefix).await? {
        if !rule.is_expired(object.modified, now) {
            continue;
        }
        if store.delete(&object.key).await? {
            debug!(key = %object.key, modified = %object.modified, "Purged expired artifact");
            purged.push(object.key);
        }
    }

    if !purged.is_empty() {
        info!(prefix = %rule.prefix, count = purged.len(), "Retention purge complete");
    }
    Ok(purged)
}

mod duration_days {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_days())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let days = u32::deserialize(deserializer)?;
        Ok(Duration::days(i64::from(days)))
    }
}
