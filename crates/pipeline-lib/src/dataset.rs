//! Dataset loading
//!
//! Reads a headerless CSV file into a numeric table whose columns carry the
//! configured names. The last column is the label, every preceding column
//! is a feature.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use ndarray::{s, Array1, Array2, Axis};
use polars::prelude::*;
use rand::Rng;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Numeric table with named columns
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Vec<String>,
    values: Array2<f64>,
}

impl Dataset {
    /// Build a dataset from already-parsed values
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(PipelineError::Shape {
                expected: format!("{} columns", names.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        if names.len() < 2 {
            return Err(PipelineError::Data(
                "dataset needs at least one feature and one label column".to_string(),
            ));
        }
        Ok(Self { names, values })
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn n_features(&self) -> usize {
        self.n_columns() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Name of the label column
    pub fn label_name(&self) -> &str {
        &self.names[self.names.len() - 1]
    }

    /// All rows, all columns
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Feature matrix (every column but the last)
    pub fn features(&self) -> Array2<f64> {
        self.values.slice(s![.., ..self.n_features()]).to_owned()
    }

    /// Label vector (last column) as integer classes
    pub fn labels(&self) -> Result<Array1<i64>> {
        self.values
            .column(self.n_features())
            .iter()
            .enumerate()
            .map(|(row, &v)| to_class(v, row))
            .collect::<Result<Vec<_>>>()
            .map(Array1::from)
    }

    /// Keep only the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Draw one random row and return its features without the label
    pub fn sample_features<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<f64>> {
        if self.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.n_rows());
        let row = self.values.row(index);
        Some(row.iter().take(self.n_features()).copied().collect())
    }
}

fn to_class(value: f64, row: usize) -> Result<i64> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(PipelineError::Data(format!(
            "label in row {} is not an integer class: {}",
            row, value
        )));
    }
    Ok(value as i64)
}

/// Read the dataset named by the configuration
pub fn read_dataset(config: &PipelineConfig) -> Result<Dataset> {
    read_csv(&config.dataset.path, &config.dataset.names)
}

/// Read a headerless CSV file and name its columns
pub fn read_csv(path: impl AsRef<Path>, names: &[String]) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let mut frame = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()?;

    if frame.width() != names.len() {
        return Err(PipelineError::Shape {
            expected: format!("{} columns ({})", names.len(), names.join(", ")),
            actual: format!("{} columns in {}", frame.width(), path.display()),
        });
    }
    frame.set_column_names(names)?;

    let mut values = Array2::<f64>::zeros((frame.height(), names.len()));
    for (col_idx, name) in names.iter().enumerate() {
        let series = frame.column(name)?.cast(&DataType::Float64)?;
        for (row_idx, value) in series.f64()?.into_iter().enumerate() {
            values[[row_idx, col_idx]] = value.ok_or_else(|| {
                PipelineError::Data(format!(
                    "missing or non-numeric value in column '{}' row {}",
                    name, row_idx
                ))
            })?;
        }
    }

    debug!(
        path = %path.display(),
        rows = values.nrows(),
        columns = values.ncols(),
        "Dataset loaded"
    );

    Dataset::new(names.to_vec(), values)
}
