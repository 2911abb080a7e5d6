//! Artifact publishing
//!
//! Serializes a trained model into the local model directory and uploads the
//! same bytes to the object store. Failures are returned to the caller,
//! which decides whether a failed publish aborts the run.

use crate::artifact::{compute_checksum, ArtifactName};
use crate::config::PipelineConfig;
use crate::storage::{ObjectStore, StorageError};
use crate::trainer::TrainedModel;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

/// Where a published artifact ended up
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub artifact: ArtifactName,
    pub local_path: PathBuf,
    pub key: String,
    pub location: String,
    pub checksum: String,
    pub size_bytes: usize,
}

/// Why a publish did not complete
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to serialize model: {0}")]
    Serialize(String),

    #[error("failed to write {path}: {source}")]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model saved to {local_path} but upload to {key} failed: {source}")]
    Upload {
        local_path: PathBuf,
        key: String,
        #[source]
        source: StorageError,
    },
}

/// Serialize the model locally, then upload it under the configured prefix
pub async fn save_model_to_store(
    model: &TrainedModel,
    config: &PipelineConfig,
    store: &dyn ObjectStore,
) -> Result<PublishReceipt, PublishError> {
    publish_at(model, config, store, Utc::now()).await
}

/// Same as [`save_model_to_store`] with an explicit creation time
pub async fn publish_at(
    model: &TrainedModel,
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    now: DateTime<Utc>,
) -> Result<PublishReceipt, PublishError> {
    let artifact = ArtifactName::new(&config.model.model_name, now);
    let bytes = model
        .to_bytes()
        .map_err(|e| PublishError::Serialize(e.to_string()))?;

    let local_path = config.model.model_dir.join(artifact.file_name());
    write_local(&local_path, &bytes).await.map_err(|source| PublishError::LocalWrite {
        path: local_path.clone(),
        source,
    })?;

    let key = artifact.key(&config.storage.prefix);
    let checksum = compute_checksum(&bytes);
    let size_bytes = bytes.len();

    if let Err(source) = store.put(&key, bytes).await {
        error!(
            event = "model_publish_failed",
            key = %key,
            location = %store.location(),
            error = %source,
            "Error uploading model"
        );
        return Err(PublishError::Upload {
            local_path,
            key,
            source,
        });
    }

    info!(
        event = "model_published",
        key = %key,
        location = %store.location(),
        checksum = %checksum,
        size = size_bytes,
        "Model uploaded"
    );

    Ok(PublishReceipt {
        artifact,
        local_path,
        key,
        location: store.location(),
        checksum,
        size_bytes,
    })
}

async fn write_local(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
