//! Model training
//!
//! Seeded train/test partitioning, logistic-regression fitting and
//! held-out accuracy scoring.

mod model;

pub use model::TrainedModel;

use model::{Classifier, FeatureScaler};

use crate::config::PipelineConfig;
use crate::dataset::{self, Dataset};
use crate::error::{PipelineError, Result};
use linfa::prelude::*;
use linfa_logistic::{LogisticRegression, MultiLogisticRegression};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::{debug, info};

/// Feature matrices and label vectors for both partitions
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<i64>,
    pub y_test: Array1<i64>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Row indices of a seeded shuffle split
///
/// The first `ceil(n_samples * test_size)` shuffled indices become the test
/// partition, the remainder the training partition.
pub fn split_indices(n_samples: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be strictly between 0 and 1".to_string(),
        });
    }

    let n_test = (n_samples as f64 * test_size).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::Data(format!(
            "cannot split {} rows with test_size {}: a partition would be empty",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Partition a dataset into train/test features and labels
pub fn prepare_training_data(dataset: &Dataset, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    let (train_indices, test_indices) = split_indices(dataset.n_rows(), test_size, seed)?;

    let train = dataset.select_rows(&train_indices);
    let test = dataset.select_rows(&test_indices);

    debug!(
        train_rows = train.n_rows(),
        test_rows = test.n_rows(),
        seed = seed,
        "Prepared training data"
    );

    Ok(TrainTestSplit {
        x_train: train.features(),
        x_test: test.features(),
        y_train: train.labels()?,
        y_test: test.labels()?,
        train_indices,
        test_indices,
    })
}

/// Fit a logistic-regression classifier
///
/// Two distinct labels give a binary model; more than two give a multinomial
/// (softmax) model over all classes. Features are standardized before
/// fitting and the scaler is kept with the model. The L-BFGS solver stops after `max_iterations` even when it has
/// not converged; the resulting model is returned as-is.
pub fn train_model(features: &Array2<f64>, labels: &Array1<i64>, max_iterations: u64) -> Result<TrainedModel> {
    if features.nrows() != labels.len() {
        return Err(PipelineError::Shape {
            expected: format!("{} labels", features.nrows()),
            actual: format!("{} labels", labels.len()),
        });
    }
    if features.nrows() == 0 {
        return Err(PipelineError::Data("no training rows".to_string()));
    }

    let n_features = features.ncols();
    let scaler = FeatureScaler::fit(features)?;
    let dataset = linfa::Dataset::new(scaler.transform(features), labels.clone());

    let mut classes: Vec<i64> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let start = Instant::now();
    let fitted = if classes.len() > 2 {
        MultiLogisticRegression::default()
            .max_iterations(max_iterations)
            .fit(&dataset)
            .map(Classifier::Multinomial)
    } else {
        LogisticRegression::default()
            .max_iterations(max_iterations)
            .fit(&dataset)
            .map(Classifier::Binary)
    };
    let classifier = fitted.map_err(|e| PipelineError::Training(e.to_string()))?;

    debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        rows = features.nrows(),
        features = n_features,
        classes = classes.len(),
        max_iterations = max_iterations,
        "Logistic regression fitted"
    );

    Ok(TrainedModel::new(classifier, scaler))
}

/// Mean accuracy of the model on a labelled set, in `[0, 1]`
pub fn evaluate_model(model: &TrainedModel, features: &Array2<f64>, labels: &Array1<i64>) -> Result<f64> {
    if features.nrows() != labels.len() {
        return Err(PipelineError::Shape {
            expected: format!("{} labels", features.nrows()),
            actual: format!("{} labels", labels.len()),
        });
    }
    if labels.is_empty() {
        return Err(PipelineError::Data("cannot evaluate on an empty set".to_string()));
    }

    let predictions = model.predict(features)?;
    let correct = predictions
        .iter()
        .zip(labels.iter())
        .filter(|(predicted, actual)| predicted == actual)
        .count();

    Ok(correct as f64 / labels.len() as f64)
}

/// Outcome of a full read → split → fit → evaluate run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: TrainedModel,
    pub accuracy: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Run the training sequence described by the configuration
pub fn run_training(config: &PipelineConfig) -> Result<TrainingReport> {
    info!(
        event = "training_started",
        path = %config.dataset.path.display(),
        "Reading dataset"
    );
    let dataset = dataset::read_dataset(config)?;

    info!("Preparing training data");
    let split = prepare_training_data(&dataset, config.model.test_size, config.model.seed)?;

    info!("Training model");
    let model = train_model(&split.x_train, &split.y_train, config.model.max_iterations)?;
    let accuracy = evaluate_model(&model, &split.x_test, &split.y_test)?;

    Ok(TrainingReport {
        model,
        accuracy,
        train_rows: split.x_train.nrows(),
        test_rows: split.x_test.nrows(),
    })
}
