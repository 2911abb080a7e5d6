//! Pipeline configuration
//!
//! A single `PipelineConfig` is loaded once at process entry from a YAML
//! file (plus `PIPELINE__*` environment overrides) and passed by reference
//! to every stage.

use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "PIPELINE_CONFIG";

/// Default configuration file name, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Dataset location and column layout
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Path to a headerless CSV file
    pub path: PathBuf,
    /// Column names; the last one is the label
    pub names: Vec<String>,
}

/// Model hyperparameters and local artifact location
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Upper bound on solver iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// Local directory for serialized artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_model_name")]
    pub model_name: String,
}

/// Which object store backs the artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

/// Object storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// S3 bucket name
    #[serde(default)]
    pub bucket: String,

    /// Key prefix under which artifacts are stored and listed
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// AWS region override (falls back to the default provider chain)
    #[serde(default)]
    pub region: Option<String>,

    /// Send unsigned requests (public buckets)
    #[serde(default)]
    pub anonymous: bool,

    /// Root directory for the local backend
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
}

/// Prediction endpoint URLs used by the client driver
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_local_url")]
    pub local_url: String,

    #[serde(default = "default_remote_url")]
    pub remote_url: String,
}

/// Prediction server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_test_size() -> f64 {
    0.33
}

fn default_seed() -> u64 {
    7
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_model_name() -> String {
    "logistic_regression".to_string()
}

fn default_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_prefix() -> String {
    "models/".to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("artifact-store")
}

fn default_local_url() -> String {
    "http://localhost:5000/predict".to_string()
}

fn default_remote_url() -> String {
    "http://prediction-api:5000/predict".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
            max_iterations: default_max_iterations(),
            model_dir: default_model_dir(),
            model_name: default_model_name(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: String::new(),
            prefix: default_prefix(),
            region: None,
            anonymous: false,
            local_root: default_local_root(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            local_url: default_local_url(),
            remote_url: default_remote_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file and `PIPELINE__*` environment variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::Config(format!(
                "configuration file {} not found",
                path.display()
            )));
        }

        let config: PipelineConfig = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(config::Environment::with_prefix("PIPELINE").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `$PIPELINE_CONFIG`, or `config.yaml` in the working directory
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Parse configuration from a YAML string (no environment overrides)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.dataset.names.len() < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "dataset.names".to_string(),
                value: format!("{:?}", self.dataset.names),
                reason: "at least one feature and one label column are required".to_string(),
            });
        }

        if !(self.model.test_size > 0.0 && self.model.test_size < 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "model.test_size".to_string(),
                value: self.model.test_size.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }

        if self.model.max_iterations == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "model.max_iterations".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.is_empty() {
            return Err(PipelineError::InvalidParameter {
                name: "storage.bucket".to_string(),
                value: String::new(),
                reason: "required for the s3 backend".to_string(),
            });
        }

        Ok(())
    }

    /// Number of feature columns (all but the label)
    pub fn feature_count(&self) -> usize {
        self.dataset.names.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
dataset:
  path: data/diabetes.csv
  names: [preg, plas, pres, skin, test, mass, pedi, age, class]
model:
  test_size: 0.33
  seed: 7
  max_iterations: 500
  model_dir: models
  model_name: diabetes
storage:
  backend: local
  local_root: /tmp/artifacts
api:
  local_url: http://localhost:5000/predict
  remote_url: http://example.com/predict
"#;

    #[test]
    fn test_parse_full_config() {
        let config = PipelineConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.dataset.names.len(), 9);
        assert_eq!(config.feature_count(), 8);
        assert_eq!(config.model.seed, 7);
        assert_eq!(config.model.max_iterations, 500);
        assert_eq!(config.model.model_name, "diabetes");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.prefix, "models/");
        assert_eq!(config.api.remote_url, "http://example.com/predict");
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000");
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
dataset:
  path: data.csv
  names: [a, b, label]
storage:
  backend: s3
  bucket: my-bucket
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.model.test_size, 0.33);
        assert_eq!(config.model.max_iterations, 1000);
        assert_eq!(config.model.model_dir, PathBuf::from("models"));
        assert_eq!(config.storage.bucket, "my-bucket");
        assert!(!config.storage.anonymous);
    }

    #[test]
    fn test_rejects_bad_test_size() {
        let yaml = YAML.replace("test_size: 0.33", "test_size: 1.5");
        let err = PipelineConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    }

    #[test]
    fn test_s3_requires_bucket() {
        let yaml = YAML.replace("backend: local", "backend: s3");
        let err = PipelineConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("storage.bucket"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PipelineConfig::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();

        std::env::set_var("PIPELINE__MODEL__SEED", "99");
        let loaded = PipelineConfig::load(&path);
        std::env::remove_var("PIPELINE__MODEL__SEED");

        let config = loaded.unwrap();
        assert_eq!(config.model.seed, 99);
        assert_eq!(config.model.model_name, "diabetes");
        assert_eq!(config.storage.local_root, PathBuf::from("/tmp/artifacts"));
    }
}
