//! Latest-model retrieval
//!
//! Lists artifacts under the configured prefix, downloads the newest one
//! into the local model directory and deserializes it. Runs once at
//! prediction-service startup.

use crate::artifact::{compute_checksum, file_name_of};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::storage::{select_latest, ObjectMeta, ObjectStore};
use crate::trainer::TrainedModel;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A model pulled from the store, with where it came from
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: TrainedModel,
    pub source: ObjectMeta,
    pub local_path: PathBuf,
    pub checksum: String,
}

/// Download the newest artifact to `{model_dir}/{file name}`
///
/// The local directory comes from configuration, the file name from the
/// selected key. Directory marker keys (ending in `/`) are not artifacts and
/// are skipped. Fails with `NotFound` when the prefix holds no objects.
pub async fn download_latest_model(
    store: &dyn ObjectStore,
    config: &PipelineConfig,
) -> Result<(ObjectMeta, PathBuf)> {
    let prefix = &config.storage.prefix;
    let mut objects = store.list(prefix).await?;
    objects.retain(|o| !file_name_of(&o.key).is_empty());

    let latest = select_latest(&objects)
        .cloned()
        .ok_or_else(|| {
            PipelineError::NotFound(format!(
                "no model files found under {}/{}",
                store.location(),
                prefix
            ))
        })?;

    debug!(
        candidates = objects.len(),
        key = %latest.key,
        last_modified = %latest.last_modified,
        "Selected latest artifact"
    );

    let bytes = store.get(&latest.key).await?;
    let local_path = config.model.model_dir.join(file_name_of(&latest.key));
    write_file(&local_path, &bytes).await?;

    Ok((latest, local_path))
}

/// Download and deserialize the newest artifact
pub async fn fetch_latest_model(store: &dyn ObjectStore, config: &PipelineConfig) -> Result<LoadedModel> {
    let (source, local_path) = download_latest_model(store, config).await?;
    let bytes = fs::read(&local_path).await?;
    let checksum = compute_checksum(&bytes);
    let model = TrainedModel::from_bytes(&bytes)?;

    info!(
        event = "model_loaded",
        key = %source.key,
        path = %local_path.display(),
        checksum = %checksum,
        features = model.n_features(),
        "Loaded latest model"
    );

    Ok(LoadedModel {
        model,
        source,
        local_path,
        checksum,
    })
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::trainer::train_model;
    use chrono::{TimeZone, Utc};
    use ndarray::array;
    use tempfile::TempDir;

    fn config_for(model_dir: &Path) -> PipelineConfig {
        let yaml = format!(
            r#"
dataset:
  path: unused.csv
  names: [a, b, label]
model:
  model_dir: {}
storage:
  backend: local
  prefix: models/
"#,
            model_dir.display()
        );
        PipelineConfig::from_yaml_str(&yaml).unwrap()
    }

    fn model_bytes(flip: bool) -> Vec<u8> {
        let x = array![[0.0, 0.0], [0.5, 0.5], [1.0, 1.0], [4.0, 4.0], [4.5, 4.5], [5.0, 5.0]];
        let y = if flip {
            array![1_i64, 1, 1, 0, 0, 0]
        } else {
            array![0_i64, 0, 0, 1, 1, 1]
        };
        train_model(&x, &y, 100).unwrap().to_bytes().unwrap()
    }

    #[tokio::test]
    async fn test_fetch_picks_most_recent() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path());
        let store = MemoryStore::new();

        store.insert(
            "models/m_v20240301-000000.bin",
            model_bytes(true),
            Utc.timestamp_opt(3_000, 0).unwrap(),
        );
        store.insert(
            "models/m_v20240101-000000.bin",
            model_bytes(false),
            Utc.timestamp_opt(1_000, 0).unwrap(),
        );

        let loaded = fetch_latest_model(&store, &config).await.unwrap();
        assert_eq!(loaded.source.key, "models/m_v20240301-000000.bin");
        assert_eq!(loaded.local_path, temp_dir.path().join("m_v20240301-000000.bin"));
        assert!(loaded.local_path.exists());
        assert_eq!(loaded.model.predict_one(&[0.0, 0.0]).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path());
        let store = MemoryStore::new();

        let err = fetch_latest_model(&store, &config).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_objects_outside_prefix_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path());
        let store = MemoryStore::new();
        store.insert("archive/m.bin", model_bytes(false), Utc::now());

        assert!(matches!(
            fetch_latest_model(&store, &config).await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_marker_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path());
        let store = MemoryStore::new();

        store.insert(
            "models/m_v20240101-000000.bin",
            model_bytes(false),
            Utc.timestamp_opt(1_000, 0).unwrap(),
        );
        store.insert("models/", Vec::new(), Utc.timestamp_opt(9_000, 0).unwrap());

        let loaded = fetch_latest_model(&store, &config).await.unwrap();
        assert_eq!(loaded.source.key, "models/m_v20240101-000000.bin");
        assert_eq!(loaded.local_path, temp_dir.path().join("m_v20240101-000000.bin"));
    }

    #[tokio::test]
    async fn test_only_directory_marker_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path());
        let store = MemoryStore::new();
        store.insert("models/", Vec::new(), Utc::now());

        assert!(matches!(
            fetch_latest_model(&store, &config).await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path());
        let store = MemoryStore::new();
        store.insert("models/bad_v20240101-000000.bin", b"garbage".to_vec(), Utc::now());

        assert!(matches!(
            fetch_latest_model(&store, &config).await,
            Err(PipelineError::Serialization(_))
        ));
    }
}
