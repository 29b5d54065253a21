//! Training Engine Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Training hyperparameters and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cross-validation folds
    pub folds: usize,
    /// Seed for fold shuffling and bootstrap sampling
    pub seed: u64,
    /// Trees in the random forest
    pub n_estimators: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
    /// Inverse L2 regularization strength for logistic regression
    pub logistic_c: f64,
    /// Newton iterations for logistic regression
    pub logistic_max_iter: usize,
    /// Wall-clock budget for cross-validation plus the final refit
    pub cv_timeout_secs: u64,
    /// Feature column used for class × group weighting
    pub grouping_column: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: 42,
            n_estimators: 200,
            max_depth: 5,
            min_samples_leaf: 5,
            logistic_c: 0.1,
            logistic_max_iter: 100,
            cv_timeout_secs: 120,
            grouping_column: "Access_to_Resources".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn cv_timeout(&self) -> Duration {
        Duration::from_secs(self.cv_timeout_secs)
    }
}
