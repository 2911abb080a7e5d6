//! Core library for the training and prediction pipeline
//!
//! This crate provides the core functionality for:
//! - Reading the tabular dataset from CSV
//! - Seeded train/test split, logistic regression fit and accuracy
//! - Publishing timestamped model artifacts to an object store
//! - Retrieving the most recent artifact for serving
//! - Configuration, error types and observability shared by the binaries

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod observability;
pub mod publisher;
pub mod storage;
pub mod trainer;

pub use artifact::ArtifactName;
pub use config::PipelineConfig;
pub use dataset::{read_csv, read_dataset, Dataset};
pub use error::{PipelineError, Result};
pub use fetcher::{download_latest_model, fetch_latest_model, LoadedModel};
pub use observability::{PipelineLogger, ServiceMetrics};
pub use publisher::{save_model_to_store, PublishError, PublishReceipt};
pub use storage::{build_store, ObjectMeta, ObjectStore, StorageError};
pub use trainer::{run_training, TrainedModel, TrainingReport};

#[cfg(test)]
mod tests;
