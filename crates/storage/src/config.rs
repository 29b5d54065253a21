//! Storage Configuration

use serde::{Deserialize, Serialize};

/// Retention caps and archive location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Artifacts kept in memory; the oldest is evicted first
    pub max_artifacts: usize,
    pub max_datasets: usize,
    pub max_predictions: usize,
    /// Rows of each uploaded dataset kept for charting
    pub dataset_sample_rows: usize,
    /// SQLite URL for the artifact archive, e.g. `sqlite://tabular.db`
    pub database_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_artifacts: 1_000,
            max_datasets: 100,
            max_predictions: 10_000,
            dataset_sample_rows: 50,
            database_url: None,
        }
    }
}
