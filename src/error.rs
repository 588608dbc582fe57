//! Error types for the SVR training pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SvrError>;

/// Main error type for training, tuning and inference
#[derive(Error, Debug)]
pub enum SvrError {
    /// Bad bounds or budgets, rejected before any optimizer work starts
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Column not found: {0}")]
    ColumnMissing(String),

    #[error("Column '{column}' is not numeric: {reason}")]
    NonNumericData { column: String, reason: String },

    #[error("Length mismatch: {predictions} predictions vs {truth} ground-truth values")]
    LengthMismatch { predictions: usize, truth: usize },

    /// The objective failed during a trial; the whole tuning run is void
    #[error("Optimization failed at trial {trial}: {reason}")]
    OptimizationFailure { trial: usize, reason: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("No trained model")]
    NoTrainedModel,

    #[error("Algorithm is busy")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SvrError {
    /// Missing or non-numeric columns, surfaced before training starts
    pub fn is_dataset_error(&self) -> bool {
        matches!(self, SvrError::ColumnMissing(_) | SvrError::NonNumericData { .. })
    }
}

impl From<polars::error::PolarsError> for SvrError {
    fn from(err: polars::error::PolarsError) -> Self {
        match err {
            polars::error::PolarsError::ColumnNotFound(name) => SvrError::ColumnMissing(name.to_string()),
            other => SvrError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SvrError {
    fn from(err: serde_json::Error) -> Self {
        SvrError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SvrError {
    fn from(err: ndarray::ShapeError) -> Self {
        SvrError::Training(format!("invalid shape: {}", err))
    }
}
