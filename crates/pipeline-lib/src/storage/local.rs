//! Local-directory backend
//!
//! Object keys map to paths under a root directory; last-modified comes from
//! file metadata.

use super::{ObjectMeta, ObjectStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Artifact store rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create the store, creating the root directory if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.split('/').any(|part| part == "..") {
            return Err(StorageError::Backend {
                operation: "resolve",
                target: key.to_string(),
                message: "invalid object key".to_string(),
            });
        }
        Ok(self.root.join(key))
    }

    /// Gather every finished object below the root, descending into subdirectories
    async fn collect(&self) -> Result<Vec<ObjectMeta>, StorageError> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;

                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().map(|e| e == "tmp").unwrap_or(false) {
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                objects.push(ObjectMeta {
                    key,
                    last_modified: DateTime::<Utc>::from(metadata.modified()?),
                    size_bytes: metadata.len(),
                });
            }
        }
        Ok(objects)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let mut objects = self.collect().await?;
        objects.retain(|o| o.key.starts_with(prefix));
        Ok(objects)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temp file first so a listing never sees a partial object
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_list() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path()).unwrap();

        store.put("models/a_v20240101-000000.bin", b"first".to_vec()).await.unwrap();
        store.put("other/readme.txt", b"x".to_vec()).await.unwrap();

        let listed = store.list("models/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "models/a_v20240101-000000.bin");
        assert_eq!(listed[0].size_bytes, 5);

        let body = store.get("models/a_v20240101-000000.bin").await.unwrap();
        assert_eq!(body, b"first");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path()).unwrap();
        let err = store.get("models/missing.bin").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path()).unwrap();
        assert!(store.put("../escape.bin", vec![1]).await.is_err());
    }

    #[tokio::test]
    async fn test_list_walks_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path()).unwrap();

        store.put("models/2024/01/a.bin", b"a".to_vec()).await.unwrap();
        store.put("models/b.bin", b"bb".to_vec()).await.unwrap();

        let mut keys: Vec<String> = store.list("models/").await.unwrap().into_iter().map(|o| o.key).collect();
        keys.sort();
        assert_eq!(keys, vec!["models/2024/01/a.bin", "models/b.bin"]);
    }

    #[tokio::test]
    async fn test_list_empty_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path()).unwrap();
        assert!(store.list("models/").await.unwrap().is_empty());
    }
}
