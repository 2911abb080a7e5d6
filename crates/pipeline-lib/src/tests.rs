//! End-to-end tests over the bundled dataset
//!
//! These tests verify:
//! - Reading the reference CSV
//! - Training and evaluating on it
//! - Publishing to a store and loading the newest artifact back

use super::*;
use crate::storage::{LocalStore, MemoryStore};
use crate::trainer::{evaluate_model, prepare_training_data, train_model};
use chrono::{Duration, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/diabetes.csv")
}

fn fixture_config(work_dir: &Path) -> PipelineConfig {
    let yaml = format!(
        r#"
dataset:
  path: {}
  names: [preg, plas, pres, skin, test, mass, pedi, age, class]
model:
  test_size: 0.33
  seed: 7
  max_iterations: 1000
  model_dir: {}
  model_name: logistic_regression
storage:
  backend: local
  local_root: {}
"#,
        fixture_path().display(),
        work_dir.join("models").display(),
        work_dir.join("store").display()
    );
    PipelineConfig::from_yaml_str(&yaml).unwrap()
}

mod dataset_tests {
    use super::*;

    #[test]
    fn test_read_dataset_has_nine_columns() {
        let temp_dir = TempDir::new().unwrap();
        let dataset = read_dataset(&fixture_config(temp_dir.path())).unwrap();

        assert_eq!(dataset.n_columns(), 9);
        assert_eq!(dataset.n_features(), 8);
        assert_eq!(dataset.label_name(), "class");
        assert!(dataset.n_rows() > 100);
    }

    #[test]
    fn test_labels_are_binary() {
        let temp_dir = TempDir::new().unwrap();
        let dataset = read_dataset(&fixture_config(temp_dir.path())).unwrap();

        let labels = dataset.labels().unwrap();
        assert!(labels.iter().all(|&l| l == 0 || l == 1));
        assert!(labels.iter().any(|&l| l == 0));
        assert!(labels.iter().any(|&l| l == 1));
    }
}

mod training_tests {
    use super::*;

    #[test]
    fn test_train_model_on_fixture() {
        let temp_dir = TempDir::new().unwrap();
        let config = fixture_config(temp_dir.path());
        let dataset = read_dataset(&config).unwrap();

        let split = prepare_training_data(&dataset, config.model.test_size, config.model.seed).unwrap();
        let model = train_model(&split.x_train, &split.y_train, config.model.max_iterations).unwrap();

        assert_eq!(model.n_features(), 8);
        let prediction = model.predict_one(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
        assert!(prediction == 0 || prediction == 1);

        let accuracy = evaluate_model(&model, &split.x_test, &split.y_test).unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn test_split_sizes_follow_ratio() {
        let temp_dir = TempDir::new().unwrap();
        let config = fixture_config(temp_dir.path());
        let dataset = read_dataset(&config).unwrap();

        let split = prepare_training_data(&dataset, 0.33, 7).unwrap();
        let expected_test = (dataset.n_rows() as f64 * 0.33).ceil() as usize;

        assert_eq!(split.x_test.nrows(), expected_test);
        assert_eq!(split.x_train.nrows() + split.x_test.nrows(), dataset.n_rows());
    }

    #[test]
    fn test_run_training_is_reproducible() {
        let temp_dir = TempDir::new().unwrap();
        let config = fixture_config(temp_dir.path());

        let first = run_training(&config).unwrap();
        let second = run_training(&config).unwrap();

        assert_eq!(first.accuracy, second.accuracy);
        assert_eq!(first.train_rows, second.train_rows);
        let x = read_dataset(&config).unwrap().features();
        assert_eq!(first.model.predict(&x).unwrap(), second.model.predict(&x).unwrap());
    }
}

mod publish_and_fetch_tests {
    use super::*;
    use crate::publisher::publish_at;

    #[tokio::test]
    async fn test_publish_then_fetch_latest() {
        let temp_dir = TempDir::new().unwrap();
        let config = fixture_config(temp_dir.path());
        let store = LocalStore::new(&config.storage.local_root).unwrap();

        let report = run_training(&config).unwrap();
        let receipt = save_model_to_store(&report.model, &config, &store).await.unwrap();
        assert!(receipt.key.starts_with("models/logistic_regression_v"));
        assert!(receipt.key.ends_with(".bin"));

        let mut server_config = config.clone();
        server_config.model.model_dir = temp_dir.path().join("served");
        let loaded = fetch_latest_model(&store, &server_config).await.unwrap();

        assert_eq!(loaded.source.key, receipt.key);
        assert_eq!(loaded.checksum, receipt.checksum);
        assert_eq!(loaded.model.trained_at(), report.model.trained_at());
        let x = read_dataset(&config).unwrap().features();
        assert_eq!(loaded.model.predict(&x).unwrap(), report.model.predict(&x).unwrap());
    }

    #[tokio::test]
    async fn test_newest_upload_wins() {
        let temp_dir = TempDir::new().unwrap();
        let config = fixture_config(temp_dir.path());
        let store = MemoryStore::new();
        let report = run_training(&config).unwrap();

        let older = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let first = publish_at(&report.model, &config, &store, older).await.unwrap();
        let second = publish_at(&report.model, &config, &store, older + Duration::hours(1))
            .await
            .unwrap();
        assert_ne!(first.key, second.key);

        // Uploads through the store get the store's own clock, so pin them
        let body = store.get(&second.key).await.unwrap();
        store.insert(&first.key, store.get(&first.key).await.unwrap(), older);
        store.insert(&second.key, body, older + Duration::hours(1));

        let loaded = fetch_latest_model(&store, &config).await.unwrap();
        assert_eq!(loaded.source.key, second.key);
    }
}
