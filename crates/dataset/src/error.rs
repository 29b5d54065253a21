//! Dataset Error Types

use thiserror::Error;

/// Errors raised while ingesting or preparing a dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Dataset is empty or too small to train on
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Target column cannot be used
    #[error("Invalid target column: {0}")]
    InvalidTarget(String),

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Underlying reader failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
