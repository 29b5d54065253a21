//! Inference Engine
//!
//! Rebuilds the feature vector of a raw row from a stored artifact and runs
//! the artifact's linear or ensemble model on it.

mod engine;
mod predictor;

pub use engine::{InferenceEngine, InferenceResult, Prediction, DEFAULT_PREDICTOR_CACHE};
pub use predictor::{
    predictor_for, EnsemblePredictor, LinearPredictor, Link, Predictor, PredictorOutput,
};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Corrupt model artifact: {0}")]
    CorruptArtifact(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: usize, actual: usize },
}
