//! Repository Implementation

use crate::{StorageConfig, StorageError};
use chrono::{DateTime, Utc};
use dataset::{Dataset, RawValue};
use feature_engine::EncodingFallback;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use training_engine::{ModelArtifact, PredictedValue};
use uuid::Uuid;

/// Uploaded dataset, reduced to its headers and a capped sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: Uuid,
    pub owner: Option<String>,
    pub headers: Vec<String>,
    /// Row count of the full upload
    pub row_count: usize,
    pub sample: Vec<BTreeMap<String, RawValue>>,
    pub created_at: DateTime<Utc>,
}

impl DatasetRecord {
    pub fn from_dataset(dataset: &Dataset, owner: Option<String>, sample_rows: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            headers: dataset.columns().to_vec(),
            row_count: dataset.row_count(),
            sample: dataset.sample(sample_rows),
            created_at: Utc::now(),
        }
    }

    /// Cells of one column across the sample, missing where a row lacks it
    pub fn column(&self, name: &str) -> Vec<RawValue> {
        self.sample
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or(RawValue::Missing))
            .collect()
    }
}

/// Prediction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub model_id: Uuid,
    pub target_name: String,
    pub value: PredictedValue,
    pub confidence: Option<f64>,
    pub input: BTreeMap<String, RawValue>,
    pub fallbacks: Vec<EncodingFallback>,
    pub created_at: DateTime<Utc>,
}

/// In-memory repository shared by the request handlers
///
/// Locks are held only long enough to insert or clone an `Arc`.
pub struct Repository {
    /// Artifacts in insertion order
    artifacts: Mutex<VecDeque<Arc<ModelArtifact>>>,
    datasets: Mutex<VecDeque<DatasetRecord>>,
    predictions: Mutex<VecDeque<PredictionRecord>>,
    next_prediction_id: Mutex<i64>,
    config: StorageConfig,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new(config: StorageConfig) -> Self {
        info!(
            "Creating in-memory repository (artifacts {}, datasets {}, predictions {})",
            config.max_artifacts, config.max_datasets, config.max_predictions
        );
        Self {
            artifacts: Mutex::new(VecDeque::new()),
            datasets: Mutex::new(VecDeque::new()),
            predictions: Mutex::new(VecDeque::with_capacity(1000)),
            next_prediction_id: Mutex::new(1),
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Store an artifact, evicting the oldest past the retention cap
    pub fn insert_artifact(&self, artifact: ModelArtifact) -> Result<Arc<ModelArtifact>, StorageError> {
        let artifact = Arc::new(artifact);
        let mut artifacts = lock(&self.artifacts)?;

        while artifacts.len() >= self.config.max_artifacts.max(1) {
            if let Some(evicted) = artifacts.pop_front() {
                debug!("Evicted artifact {}", evicted.id);
            }
        }

        artifacts.push_back(Arc::clone(&artifact));
        debug!("Stored artifact {} for target '{}'", artifact.id, artifact.target_name);
        Ok(artifact)
    }

    pub fn get_artifact(&self, id: &Uuid) -> Result<Arc<ModelArtifact>, StorageError> {
        let artifacts = lock(&self.artifacts)?;
        artifacts
            .iter()
            .find(|a| a.id == *id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("model {}", id)))
    }

    /// Artifacts newest first, optionally restricted to one owner
    pub fn list_artifacts(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Arc<ModelArtifact>>, StorageError> {
        let artifacts = lock(&self.artifacts)?;

        Ok(artifacts
            .iter()
            .rev()
            .filter(|a| owner.map_or(true, |o| a.owner.as_deref() == Some(o)))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Newest artifact for each target, targets compared case-insensitively
    pub fn latest_per_target(&self) -> Result<Vec<Arc<ModelArtifact>>, StorageError> {
        let artifacts = lock(&self.artifacts)?;
        let mut seen = HashSet::new();

        Ok(artifacts
            .iter()
            .rev()
            .filter(|a| seen.insert(a.target_name.to_lowercase()))
            .cloned()
            .collect())
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().map(|a| a.len()).unwrap_or(0)
    }

    /// Store an uploaded dataset record
    pub fn insert_dataset(&self, record: DatasetRecord) -> Result<Uuid, StorageError> {
        let mut datasets = lock(&self.datasets)?;

        while datasets.len() >= self.config.max_datasets.max(1) {
            datasets.pop_front();
        }

        let id = record.id;
        datasets.push_back(record);
        debug!("Stored dataset {}", id);
        Ok(id)
    }

    pub fn get_dataset(&self, id: &Uuid) -> Result<DatasetRecord, StorageError> {
        let datasets = lock(&self.datasets)?;
        datasets
            .iter()
            .find(|d| d.id == *id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("dataset {}", id)))
    }

    /// Insert a prediction record, assigning its id
    pub fn insert_prediction(&self, mut record: PredictionRecord) -> Result<i64, StorageError> {
        let mut predictions = lock(&self.predictions)?;
        let mut id = lock(&self.next_prediction_id)?;

        record.id = *id;
        *id += 1;

        // Enforce retention
        while predictions.len() >= self.config.max_predictions.max(1) {
            predictions.pop_front();
        }

        let returned_id = record.id;
        predictions.push_back(record);
        debug!("Inserted prediction with ID {}", returned_id);

        Ok(returned_id)
    }

    /// Predictions newest first, optionally for one model
    pub fn get_predictions(
        &self,
        model: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>, StorageError> {
        let predictions = lock(&self.predictions)?;

        Ok(predictions
            .iter()
            .rev()
            .filter(|p| model.map_or(true, |m| p.model_id == m))
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::TableNormalizer;
    use feature_engine::TaskKind;
    use training_engine::{ModelKind, ModelParameters};

    fn artifact(target: &str, owner: Option<&str>) -> ModelArtifact {
        ModelArtifact {
            id: Uuid::new_v4(),
            task: TaskKind::Regression,
            model_kind: ModelKind::LinearRegression,
            feature_order: vec!["Hours".into()],
            encoders: BTreeMap::new(),
            target_name: target.into(),
            target_classes: None,
            class_values: None,
            parameters: ModelParameters::Linear {
                coefficients: vec![2.0],
                intercept: 1.0,
            },
            validation_score: Some(0.9),
            is_binary: false,
            rows_used: 10,
            owner: owner.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn prediction(model_id: Uuid) -> PredictionRecord {
        PredictionRecord {
            id: 0,
            model_id,
            target_name: "Score".into(),
            value: PredictedValue::Number(3.0),
            confidence: None,
            input: BTreeMap::new(),
            fallbacks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_artifact_retention_and_lookup() {
        let repo = Repository::new(StorageConfig {
            max_artifacts: 2,
            ..StorageConfig::default()
        });
        let first = repo.insert_artifact(artifact("Score", None)).unwrap();
        let second = repo.insert_artifact(artifact("Score", None)).unwrap();
        let third = repo.insert_artifact(artifact("Score", None)).unwrap();

        assert_eq!(repo.artifact_count(), 2);
        assert!(matches!(
            repo.get_artifact(&first.id),
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(repo.get_artifact(&second.id).unwrap().id, second.id);
        assert_eq!(repo.get_artifact(&third.id).unwrap().id, third.id);
    }

    #[test]
    fn test_list_by_owner_newest_first() {
        let repo = Repository::default();
        let a = repo.insert_artifact(artifact("Score", Some("ana"))).unwrap();
        repo.insert_artifact(artifact("Score", Some("ben"))).unwrap();
        let c = repo.insert_artifact(artifact("Dropout", Some("ana"))).unwrap();

        let listed = repo.list_artifacts(Some("ana"), 10).unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![c.id, a.id]);
        assert_eq!(repo.list_artifacts(None, 1).unwrap()[0].id, c.id);
    }

    #[test]
    fn test_latest_per_target_ignores_case() {
        let repo = Repository::default();
        repo.insert_artifact(artifact("Dropout", None)).unwrap();
        let newer = repo.insert_artifact(artifact("dropout", None)).unwrap();
        let score = repo.insert_artifact(artifact("Score", None)).unwrap();

        let latest = repo.latest_per_target().unwrap();
        let ids: Vec<Uuid> = latest.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![score.id, newer.id]);
    }

    #[test]
    fn test_dataset_sample_is_capped() {
        let rows: Vec<Vec<String>> = (0..10).map(|i| vec![i.to_string(), "x".into()]).collect();
        let ds = TableNormalizer::new().normalize(["Age", "Name"], rows);
        let record = DatasetRecord::from_dataset(&ds, None, 3);

        assert_eq!(record.row_count, 10);
        assert_eq!(record.sample.len(), 3);
        assert_eq!(record.column("Age"), vec![RawValue::Number(0.0), RawValue::Number(1.0), RawValue::Number(2.0)]);
        assert_eq!(record.column("Missing"), vec![RawValue::Missing; 3]);

        let repo = Repository::default();
        let id = repo.insert_dataset(record).unwrap();
        assert_eq!(repo.get_dataset(&id).unwrap().headers, vec!["Age", "Name"]);
        assert!(matches!(
            repo.get_dataset(&Uuid::new_v4()),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_prediction_history() {
        let repo = Repository::new(StorageConfig {
            max_predictions: 3,
            ..StorageConfig::default()
        });
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        for i in 0..4 {
            let model = if i % 2 == 0 { m1 } else { m2 };
            assert_eq!(repo.insert_prediction(prediction(model)).unwrap(), i + 1);
        }

        assert_eq!(repo.prediction_count(), 3);
        let all = repo.get_predictions(None, 10).unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![4, 3, 2]);
        let only_m1 = repo.get_predictions(Some(m1), 10).unwrap();
        assert_eq!(only_m1.iter().map(|p| p.id).collect::<Vec<_>>(), vec![3]);
    }
}
