//! Error types for the FloodSight crate.
//!
//! Each boundary (dataset loading, persistence, prediction) raises a typed
//! error; the interactive session is the single place that renders them.

use std::path::PathBuf;
use thiserror::Error;

use crate::persistence::PersistenceError;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FloodSightError>;

/// Errors raised while reading a labeled training table.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset file does not exist.
    #[error("dataset not found at {0}")]
    NotFound(PathBuf),

    /// A required feature or target column is absent from the header.
    #[error("dataset is missing required column '{0}'")]
    MissingColumn(String),

    /// A cell could not be parsed as a number.
    #[error("invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    /// The table has a header but no data rows.
    #[error("dataset contains no rows")]
    Empty,

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum FloodSightError {
    /// A prediction was requested before any inference context was loaded.
    #[error("model not loaded: load the model and scalers before predicting")]
    ModelNotLoaded,

    /// One of the 14 required features is absent from the input mapping.
    #[error("missing feature '{0}'")]
    MissingFeature(String),

    /// A feature is present but its value is not a finite number.
    #[error("invalid feature '{name}': '{value}' is not a finite number")]
    InvalidFeature { name: String, value: String },

    /// A required artifact file is absent on disk.
    #[error("{artifact} not found at {}", path.display())]
    ArtifactMissing {
        artifact: &'static str,
        path: PathBuf,
    },

    /// Tensor or parameter widths disagree.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A scaler was fitted on an empty matrix.
    #[error("cannot fit scaler on empty data")]
    EmptyFit,

    /// Scaling or inference produced an unusable result.
    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    /// The chart was requested for a session without any runs.
    #[error("history is empty, nothing to plot")]
    EmptyHistory,

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
