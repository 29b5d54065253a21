//! Training Error Types

use dataset::DatasetError;
use feature_engine::FeatureError;
use thiserror::Error;

/// Errors raised while training or packaging a model
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Not enough rows or columns to train
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Target column cannot be learned
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Numeric solver failed on the full training set
    #[error("Solver failure: {0}")]
    Solver(String),

    /// Cross-validation or the final refit exceeded the wall-clock budget
    #[error("Training exceeded the {0}s time budget")]
    Timeout(u64),

    /// Model blob could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    /// Artifact fails its structural invariants
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl TrainingError {
    /// Whether the error was caused by the submitted data rather than the engine
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrainingError::InsufficientData(_)
                | TrainingError::InvalidTarget(_)
                | TrainingError::Feature(_)
                | TrainingError::Dataset(_)
        )
    }
}
