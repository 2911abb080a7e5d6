//! Fitted classifier wrapper
//!
//! Wraps linfa's fitted logistic regression together with the per-feature
//! standardization learned at fit time. Inputs are validated for width and
//! scaled the same way before they reach the classifier.

use crate::error::{PipelineError, Result};
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, MultiFittedLogisticRegression};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column mean and spread used to standardize inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FeatureScaler {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl FeatureScaler {
    /// Learn column means and standard deviations; constant columns keep a scale of 1
    pub(crate) fn fit(features: &Array2<f64>) -> Result<Self> {
        let means = features
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Data("no rows to fit the scaler on".to_string()))?;
        let scales = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON && s.is_finite() { s } else { 1.0 });

        Ok(Self { means, scales })
    }

    pub(crate) fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        (features - &self.means) / &self.scales
    }

    pub(crate) fn len(&self) -> usize {
        self.means.len()
    }
}

/// The fitted estimator: one sigmoid for two classes, softmax beyond that
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Classifier {
    Binary(FittedLogisticRegression<f64, i64>),
    Multinomial(MultiFittedLogisticRegression<f64, i64>),
}

impl Classifier {
    fn n_inputs(&self) -> usize {
        match self {
            Classifier::Binary(fitted) => fitted.params().len(),
            Classifier::Multinomial(fitted) => fitted.params().nrows(),
        }
    }

    fn predict(&self, features: &Array2<f64>) -> Array1<i64> {
        match self {
            Classifier::Binary(fitted) => fitted.predict(features),
            Classifier::Multinomial(fitted) => fitted.predict(features),
        }
    }
}

/// A fitted logistic-regression classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    classifier: Classifier,
    scaler: FeatureScaler,
    n_features: usize,
    trained_at: i64,
}

impl TrainedModel {
    pub(crate) fn new(classifier: Classifier, scaler: FeatureScaler) -> Self {
        Self {
            classifier,
            n_features: scaler.len(),
            scaler,
            trained_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Number of features every input row must have
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Unix timestamp (seconds) of the fit
    pub fn trained_at(&self) -> i64 {
        self.trained_at
    }

    /// Predict classes for a feature matrix
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<i64>> {
        self.check_width(features.ncols())?;
        Ok(self.classifier.predict(&self.scaler.transform(features)))
    }

    /// Predict the class of exactly one feature vector
    pub fn predict_one(&self, features: &[f64]) -> Result<i64> {
        self.check_width(features.len())?;
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Data(format!(
                "feature {} is not a finite number",
                pos
            )));
        }

        let row = Array2::from_shape_vec((1, features.len()), features.to_vec()).map_err(|e| {
            PipelineError::Shape {
                expected: format!("1x{}", self.n_features),
                actual: e.to_string(),
            }
        })?;

        self.predict(&row)?
            .first()
            .copied()
            .ok_or_else(|| PipelineError::Training("classifier returned no prediction".to_string()))
    }

    /// Serialize to the artifact payload format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Restore from an artifact payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: Self = bincode::deserialize(bytes)?;
        let inputs = model.classifier.n_inputs();
        if model.n_features == 0 || inputs != model.n_features || model.scaler.len() != model.n_features {
            return Err(PipelineError::Serialization(format!(
                "artifact declares {} features but carries {} coefficients and {} scaling terms",
                model.n_features,
                inputs,
                model.scaler.len()
            )));
        }
        Ok(model)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features {
            return Err(PipelineError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scaler_standardizes_columns() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = FeatureScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x);

        assert!((scaled.column(0).sum()).abs() < 1e-12);
        assert!(scaled[[2, 0]] > 0.0 && scaled[[0, 0]] < 0.0);
        // Constant column is centred but not divided by zero
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_scaler_rejects_empty() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(FeatureScaler::fit(&x).is_err());
    }
}
