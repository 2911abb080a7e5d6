//! In-memory backend
//!
//! Keeps objects in a map with explicit last-modified times. Listing order
//! is insertion order, which lets tests exercise selection independently of
//! how a real store orders its listing.

use super::{ObjectMeta, ObjectStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    meta: ObjectMeta,
    body: Vec<u8>,
}

/// Artifact store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<Vec<StoredObject>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object with a chosen last-modified time
    pub fn insert(&self, key: impl Into<String>, body: Vec<u8>, last_modified: DateTime<Utc>) {
        let key = key.into();
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.retain(|o| o.meta.key != key);
        objects.push(StoredObject {
            meta: ObjectMeta {
                key,
                last_modified,
                size_bytes: body.len() as u64,
            },
            body,
        });
    }

    /// Make every subsequent `put` fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|o| o.meta.key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(objects
            .iter()
            .filter(|o| o.meta.key.starts_with(prefix))
            .map(|o| o.meta.clone())
            .collect())
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend {
                operation: "upload",
                target: format!("memory://{}", key),
                message: "writes disabled".to_string(),
            });
        }
        self.insert(key, body, Utc::now());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects
            .iter()
            .find(|o| o.meta.key == key)
            .map(|o| o.body.clone())
            .ok_or_else(|| StorageError::NotFound(format!("memory://{}", key)))
    }

    fn location(&self) -> String {
        "memory://".to_string()
    }
}
