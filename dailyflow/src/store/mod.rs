//! Artifact store collaborator.
//!
//! Steps read and write durable objects through an [`ArtifactStore`]; the
//! orchestrator itself never touches it. Keys are `/`-separated relative
//! paths such as `strips/2026-10-18.gif`.

mod fs;
mod memory;
mod retention;

pub use fs::FsArtifactStore;
pub use memory::InMemoryArtifactStore;
pub use retention::{purge_expired, RetentionRule, DEFAULT_RETENTION_DAYS};

use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Debug;

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// The object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Durable key-addressed object storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    /// Stores `bytes` under `key`, replacing any previous object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Reads the object under `key`, if present.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Lists objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    /// Deletes the object under `key`. Returns false if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

/// Returns the content-addressed key `prefix/<sha256 hex>` for `bytes`.
#[must_use]
pub fn content_key(prefix: &str, bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        digest
    } else {
        format!("{prefix}/{digest}")
    }
}

/// Checks that `key` is a non-empty relative path without `..` or empty segments.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] for a malformed key.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_key(key))
    }
}
