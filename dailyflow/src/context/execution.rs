//! The per-run execution context.

use crate::errors::DataConflictError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Ordered mapping from result field to step result.
///
/// A fresh context is created for every run and is owned by the orchestrator
/// until the run terminates. Fields keep their insertion order, which is the
/// declared step order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    entries: Vec<(String, serde_json::Value)>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a step result under `field`.
    ///
    /// # Errors
    ///
    /// Returns an error if the field was already written during this run.
    pub(crate) fn insert(
        &mut self,
        field: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), DataConflictError> {
        let field = field.into();
        if self.contains(&field) {
            return Err(DataConflictError::new(field));
        }
        self.entries.push((field, value));
        Ok(())
    }

    /// Returns the result stored under `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Returns true if `field` has been written.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == field)
    }

    /// Returns the most recently merged result.
    #[must_use]
    pub fn last(&self) -> Option<&serde_json::Value> {
        self.entries.last().map(|(_, value)| value)
    }

    /// Returns the field names in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(field, result)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no field has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies the fields into a JSON object for a step request.
    #[must_use]
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl Serialize for ExecutionContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_insert_preserves_order() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("strip", json!({"key": "strips/2024-01-01.gif"})).unwrap();
        ctx.insert("feed", json!({"feed_url": "v2/rss.xml"})).unwrap();
        ctx.insert("heartbeat", json!({"status": 200})).unwrap();

        assert_eq!(ctx.fields().collect::<Vec<_>>(), vec!["strip", "feed", "heartbeat"]);
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.last(), Some(&json!({"status": 200})));
    }

    #[test]
    fn test_duplicate_field_conflicts() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("strip", json!(1)).unwrap();

        let err = ctx.insert("strip", json!(2)).unwrap_err();
        assert_eq!(err.field, "strip");
        assert_eq!(ctx.get("strip"), Some(&json!(1)));
    }

    #[test]
    fn test_serializes_in_insertion_order() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("zeta", json!(1)).unwrap();
        ctx.insert("alpha", json!(2)).unwrap();

        let json = serde_json::to_string(&ctx).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":2}"#);
    }

    #[test]
    fn test_empty_context() {
        let ctx = ExecutionContext::new();
        assert!(ctx.is_empty());
        assert!(ctx.last().is_none());
        assert!(ctx.to_map().is_empty());
    }
}
