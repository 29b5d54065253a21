//! Training Table Validation and Target Selection

use crate::error::DatasetError;
use crate::table::Dataset;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum number of columns (features + target)
    pub min_columns: usize,
    /// Minimum number of rows with a present target
    pub min_rows: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_columns: 2,
            min_rows: 1,
        }
    }
}

/// Outcome of target selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSelection {
    /// Resolved target column
    pub target: String,
    /// Every other column, in dataset order
    pub feature_columns: Vec<String>,
    /// Rows removed because the target was missing
    pub rows_dropped: usize,
}

/// Structural checks run before any training work
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Resolve the target column and drop rows where it is missing
    ///
    /// An absent or unknown target name falls back to the last column.
    pub fn select_target(
        &self,
        dataset: &mut Dataset,
        requested: Option<&str>,
    ) -> Result<TargetSelection, DatasetError> {
        if dataset.column_count() < self.config.min_columns {
            return Err(DatasetError::InsufficientData(format!(
                "CSV must contain at least {} columns (features + target), got {}",
                self.config.min_columns,
                dataset.column_count()
            )));
        }

        let requested = requested.map(str::trim).filter(|t| !t.is_empty());
        let target = match requested {
            Some(name) if dataset.column_index(name).is_some() => name.to_string(),
            other => {
                if let Some(name) = other {
                    debug!("Requested target '{}' not found, using last column", name);
                }
                // column_count() >= min_columns >= 1 was checked above
                dataset.columns()[dataset.column_count() - 1].clone()
            }
        };

        let target_idx = dataset
            .column_index(&target)
            .ok_or_else(|| DatasetError::InvalidTarget(target.clone()))?;

        let before = dataset.row_count();
        dataset.retain_rows(|row| !row[target_idx].is_missing());
        let rows_dropped = before - dataset.row_count();

        if dataset.row_count() < self.config.min_rows.max(1) {
            return Err(DatasetError::InsufficientData(format!(
                "no rows with a value for target '{}'",
                target
            )));
        }

        let feature_columns: Vec<String> = dataset
            .columns()
            .iter()
            .filter(|c| **c != target)
            .cloned()
            .collect();

        if feature_columns.is_empty() {
            return Err(DatasetError::InsufficientData(
                "No feature columns found after selecting target".to_string(),
            ));
        }

        info!(
            "Selected target '{}' with {} feature columns ({} rows dropped for missing target)",
            target,
            feature_columns.len(),
            rows_dropped
        );

        Ok(TargetSelection {
            target,
            feature_columns,
            rows_dropped,
        })
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
