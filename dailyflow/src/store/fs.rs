//! Filesystem-backed artifact store.

use super::{validate_key, ArtifactStore, ObjectMeta};
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each object as a file under a root directory.
///
/// Key segments map to nested directories.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    async fn walk(&self, dir: PathBuf, prefix: &str, out: &mut Vec<ObjectMeta>) -> Result<(), StoreError> {
        let mut pending = vec![dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(dir.display().to_string(), e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io(dir.display().to_string(), e))?
            {
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| StoreError::io(path.display().to_string(), e))?;

                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                let modified = meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .map_err(|e| StoreError::io(key.clone(), e))?;
                out.push(ObjectMeta {
                    key,
                    size: meta.len(),
                    modified,
                });
            }
        }
        Ok(())
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(segments?.join("/"))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(key, e))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        debug!(key, bytes = bytes.len(), "Stored artifact");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let mut objects = Vec::new();
        self.walk(self.root.clone(), prefix, &mut objects).await?;
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());

        store.put("strips/2026-10-18.gif", b"gif".to_vec()).await.unwrap();

        assert!(dir.path().join("strips").join("2026-10-18.gif").exists());
        assert_eq!(
            store.get("strips/2026-10-18.gif").await.unwrap(),
            Some(b"gif".to_vec())
        );
        assert_eq!(store.get("strips/missing.gif").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_walks_nested_directories() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.put("strips/a.gif", vec![0; 3]).await.unwrap();
        store.put("strips/2026/b.gif", vec![0; 5]).await.unwrap();
        store.put("feed/dilbert.xml", vec![0; 1]).await.unwrap();

        let listed = store.list("strips/").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["strips/2026/b.gif", "strips/a.gif"]);
        assert_eq!(listed[0].size, 5);

        assert_eq!(store.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_of_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().join("absent"));
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_reject_escape() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.put("feed/dilbert.xml", vec![1]).await.unwrap();

        assert!(store.delete("feed/dilbert.xml").await.unwrap());
        assert!(!store.delete("feed/dilbert.xml").await.unwrap());
        assert_err!(store.get("../outside").await);
        assert_err!(store.put("/abs/path", vec![]).await);
    }
}
