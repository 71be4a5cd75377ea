//! In-memory artifact store.

use super::{validate_key, ArtifactStore, ObjectMeta};
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

/// A process-local store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    objects: DashMap<String, StoredObject>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object with an explicit modification time.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid key.
    pub fn put_at(&self, key: &str, bytes: Vec<u8>, modified: DateTime<Utc>) -> Result<(), StoreError> {
        validate_key(key)?;
        self.objects.insert(key.to_string(), StoredObject { bytes, modified });
        Ok(())
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.put_at(key, bytes, Utc::now())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;
        Ok(self.objects.get(key).map(|o| o.bytes.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let mut objects: Vec<ObjectMeta> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| ObjectMeta {
                key: entry.key().clone(),
                size: entry.value().bytes.len() as u64,
                modified: entry.value().modified,
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.objects.remove(key).is_some())
    }
}
