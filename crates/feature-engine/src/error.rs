//! Feature Engineering Error Types

use thiserror::Error;

/// Errors raised while preparing features or targets
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeatureError {
    /// Target column cannot be used for training
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Not enough rows or columns to build a matrix
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Column referenced by name does not exist
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Two aligned sequences disagree in length
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}
