//! Model artifact naming and digests
//!
//! Artifacts are named `{model_name}_v{YYYYMMDD-HHMMSS}.bin`. The timestamp
//! is informational; which artifact is "latest" is decided by the store's
//! last-modified metadata, not by parsing names.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

/// File extension of serialized models
pub const ARTIFACT_EXTENSION: &str = "bin";

/// Timestamp layout embedded in artifact names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Artifact file name minted at publish time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub model_name: String,
    pub created_at: NaiveDateTime,
}

impl ArtifactName {
    /// Name an artifact created at `now`, truncated to whole seconds
    pub fn new(model_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let naive = now.naive_utc();
        let created_at = naive.with_nanosecond(0).unwrap_or(naive);

        Self {
            model_name: model_name.into(),
            created_at,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_v{}.{}",
            self.model_name,
            self.created_at.format(TIMESTAMP_FORMAT),
            ARTIFACT_EXTENSION
        )
    }

    /// Object key under a store prefix such as `models/`
    pub fn key(&self, prefix: &str) -> String {
        join_key(prefix, &self.file_name())
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Last path segment of an object key
pub fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Join a prefix and a file name with exactly one `/` between them
pub fn join_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// SHA-256 hex digest of an artifact payload
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
