//! Object storage for model artifacts
//!
//! This module provides:
//! - The `ObjectStore` trait used by the publisher and the fetcher
//! - An S3 backend built on the AWS SDK
//! - A local-directory backend for development
//! - An in-memory backend for tests
//! - Latest-artifact selection by last-modified time

mod local;
mod memory;
mod s3;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

use crate::config::{StorageBackend, StorageConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by object store backends
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} failed for {target}: {message}")]
    Backend {
        operation: &'static str,
        target: String,
        message: String,
    },
}

/// Listing entry for a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Minimal object store used for artifacts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError>;

    /// Store `body` under `key`, replacing any existing object
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;

    /// Fetch the object stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Human-readable location, e.g. `s3://bucket`
    fn location(&self) -> String;
}

/// Pick the most recently modified object
///
/// Equal timestamps resolve to the lexicographically greatest key, so the
/// choice never depends on listing order.
pub fn select_latest(objects: &[ObjectMeta]) -> Option<&ObjectMeta> {
    objects
        .iter()
        .max_by(|a, b| a.last_modified.cmp(&b.last_modified).then_with(|| a.key.cmp(&b.key)))
}

/// Build the store named by the configuration
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::S3 => Ok(Arc::new(S3Store::from_config(config).await)),
        StorageBackend::Local => Ok(Arc::new(LocalStore::new(&config.local_root)?)),
    }
}
