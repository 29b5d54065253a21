//! SQLite Artifact Archive
//!
//! Artifacts are written through on training, reloaded into the repository
//! at start-up and fetched by id when the repository has evicted them. Numeric arrays are stored as JSON text, the
//! encoder table and forest as postcard blobs.

use crate::StorageError;
use chrono::{DateTime, SecondsFormat, Utc};
use feature_engine::{ColumnDescriptor, TaskKind};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use training_engine::{ModelArtifact, ModelKind, ModelParameters};
use uuid::Uuid;

const CREATE_ARTIFACTS: &str = "CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY NOT NULL,
    task TEXT NOT NULL,
    model_kind TEXT NOT NULL,
    feature_order TEXT NOT NULL,
    encoders BLOB NOT NULL,
    target_name TEXT NOT NULL,
    target_classes TEXT,
    class_values TEXT,
    coefficients TEXT,
    intercept REAL,
    ensemble BLOB,
    validation_score REAL,
    is_binary INTEGER NOT NULL,
    rows_used INTEGER NOT NULL,
    owner TEXT,
    created_at TEXT NOT NULL
)";

/// Row layout of a persisted artifact
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub id: String,
    pub task: String,
    pub model_kind: String,
    /// JSON array of column names
    pub feature_order: String,
    /// Postcard-encoded encoder map
    pub encoders: Vec<u8>,
    pub target_name: String,
    pub target_classes: Option<String>,
    pub class_values: Option<String>,
    /// JSON array, linear models only
    pub coefficients: Option<String>,
    pub intercept: Option<f64>,
    /// Postcard-encoded forest
    pub ensemble: Option<Vec<u8>>,
    pub validation_score: Option<f64>,
    pub is_binary: bool,
    pub rows_used: i64,
    pub owner: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: String,
}

fn parse_label<T: DeserializeOwned>(label: &str) -> Result<T, StorageError> {
    serde_json::from_value(serde_json::Value::String(label.to_string())).map_err(StorageError::from)
}

fn json_opt<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>, StorageError> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(StorageError::from)
}

fn parse_json_opt<T: DeserializeOwned>(value: Option<&str>) -> Result<Option<T>, StorageError> {
    value
        .map(serde_json::from_str)
        .transpose()
        .map_err(StorageError::from)
}

impl StoredArtifact {
    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self, StorageError> {
        let (coefficients, intercept, ensemble) = match &artifact.parameters {
            ModelParameters::Linear {
                coefficients,
                intercept,
            } => (Some(serde_json::to_string(coefficients)?), Some(*intercept), None),
            ModelParameters::Ensemble { blob } => (None, None, Some(blob.clone())),
        };

        Ok(Self {
            id: artifact.id.to_string(),
            task: artifact.task.as_str().to_string(),
            model_kind: artifact.model_kind.as_str().to_string(),
            feature_order: serde_json::to_string(&artifact.feature_order)?,
            encoders: postcard::to_allocvec(&artifact.encoders)?,
            target_name: artifact.target_name.clone(),
            target_classes: json_opt(artifact.target_classes.as_ref())?,
            class_values: json_opt(artifact.class_values.as_ref())?,
            coefficients,
            intercept,
            ensemble,
            validation_score: artifact.validation_score,
            is_binary: artifact.is_binary,
            rows_used: artifact.rows_used as i64,
            owner: artifact.owner.clone(),
            created_at: artifact.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        })
    }

    pub fn into_artifact(self) -> Result<ModelArtifact, StorageError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StorageError::SerializationError(format!("artifact id: {}", e)))?;
        let task: TaskKind = parse_label(&self.task)?;
        let model_kind: ModelKind = parse_label(&self.model_kind)?;
        let encoders: BTreeMap<String, ColumnDescriptor> = postcard::from_bytes(&self.encoders)?;

        let parameters = match (self.coefficients.as_deref(), self.intercept, self.ensemble) {
            (Some(coefficients), Some(intercept), None) => ModelParameters::Linear {
                coefficients: serde_json::from_str(coefficients)?,
                intercept,
            },
            (None, None, Some(blob)) => ModelParameters::Ensemble { blob },
            _ => {
                return Err(StorageError::SerializationError(format!(
                    "artifact {} has neither linear nor ensemble parameters",
                    id
                )))
            }
        };

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StorageError::SerializationError(format!("created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(ModelArtifact {
            id,
            task,
            model_kind,
            feature_order: serde_json::from_str(&self.feature_order)?,
            encoders,
            target_name: self.target_name,
            target_classes: parse_json_opt(self.target_classes.as_deref())?,
            class_values: parse_json_opt(self.class_values.as_deref())?,
            parameters,
            validation_score: self.validation_score,
            is_binary: self.is_binary,
            rows_used: self.rows_used.max(0) as usize,
            owner: self.owner,
            created_at,
        })
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StorageError> {
        Ok(Self {
            id: row.try_get("id")?,
            task: row.try_get("task")?,
            model_kind: row.try_get("model_kind")?,
            feature_order: row.try_get("feature_order")?,
            encoders: row.try_get("encoders")?,
            target_name: row.try_get("target_name")?,
            target_classes: row.try_get("target_classes")?,
            class_values: row.try_get("class_values")?,
            coefficients: row.try_get("coefficients")?,
            intercept: row.try_get("intercept")?,
            ensemble: row.try_get("ensemble")?,
            validation_score: row.try_get("validation_score")?,
            is_binary: row.try_get("is_binary")?,
            rows_used: row.try_get("rows_used")?,
            owner: row.try_get("owner")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// SQLite-backed artifact archive
#[derive(Debug, Clone)]
pub struct SqliteArchive {
    pool: SqlitePool,
}

impl SqliteArchive {
    /// Open (or create) the database and ensure the schema exists
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own empty database
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await?
        };

        sqlx::query(CREATE_ARTIFACTS).execute(&pool).await?;
        info!("Opened artifact archive at {}", url);
        Ok(Self { pool })
    }

    /// Write one artifact, replacing any row with the same id
    pub async fn save(&self, artifact: &ModelArtifact) -> Result<(), StorageError> {
        let stored = StoredArtifact::from_artifact(artifact)?;

        sqlx::query(
            "INSERT OR REPLACE INTO artifacts (
                id, task, model_kind, feature_order, encoders, target_name,
                target_classes, class_values, coefficients, intercept, ensemble,
                validation_score, is_binary, rows_used, owner, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(stored.id)
        .bind(stored.task)
        .bind(stored.model_kind)
        .bind(stored.feature_order)
        .bind(stored.encoders)
        .bind(stored.target_name)
        .bind(stored.target_classes)
        .bind(stored.class_values)
        .bind(stored.coefficients)
        .bind(stored.intercept)
        .bind(stored.ensemble)
        .bind(stored.validation_score)
        .bind(stored.is_binary)
        .bind(stored.rows_used)
        .bind(stored.owner)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Archived artifact {}", artifact.id);
        Ok(())
    }

    /// Load every archived artifact, oldest first
    ///
    /// Rows that fail to decode or validate are skipped with a warning.
    pub async fn load_all(&self) -> Result<Vec<ModelArtifact>, StorageError> {
        let rows = sqlx::query("SELECT * FROM artifacts ORDER BY created_at ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut artifacts = Vec::with_capacity(rows.len());
        for row in &rows {
            let decoded = StoredArtifact::from_row(row).and_then(StoredArtifact::into_artifact);
            match decoded {
                Ok(artifact) => match artifact.validate() {
                    Ok(()) => artifacts.push(artifact),
                    Err(e) => warn!("Skipping invalid archived artifact {}: {}", artifact.id, e),
                },
                Err(e) => warn!("Skipping undecodable archived artifact: {}", e),
            }
        }

        info!("Loaded {} archived artifacts", artifacts.len());
        Ok(artifacts)
    }

    /// Load one archived artifact by id
    pub async fn load(&self, id: &Uuid) -> Result<Option<ModelArtifact>, StorageError> {
        let row = sqlx::query("SELECT * FROM artifacts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let artifact = StoredArtifact::from_row(&row)?.into_artifact()?;
        artifact
            .validate()
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        debug!("Loaded archived artifact {}", id);
        Ok(Some(artifact))
    }

    pub async fn count(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM artifacts")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_artifact() -> ModelArtifact {
        let mut encoders = BTreeMap::new();
        encoders.insert(
            "Gender".to_string(),
            ColumnDescriptor::categorical("Gender", vec!["Female".into(), "Male".into()]),
        );
        ModelArtifact {
            id: Uuid::new_v4(),
            task: TaskKind::BinaryClassification,
            model_kind: ModelKind::LogisticRegression,
            feature_order: vec!["Age".into(), "Gender".into()],
            encoders,
            target_name: "Dropout".into(),
            target_classes: None,
            class_values: Some(vec![0.0, 1.0]),
            parameters: ModelParameters::Linear {
                coefficients: vec![0.25, -1.5],
                intercept: 0.75,
            },
            validation_score: Some(0.8125),
            is_binary: true,
            rows_used: 100,
            owner: Some("analyst-7".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stored_layout() {
        let artifact = linear_artifact();
        let stored = StoredArtifact::from_artifact(&artifact).unwrap();

        assert_eq!(stored.task, "binary_classification");
        assert_eq!(stored.model_kind, "logistic_regression");
        assert_eq!(stored.feature_order, r#"["Age","Gender"]"#);
        assert_eq!(stored.coefficients.as_deref(), Some("[0.25,-1.5]"));
        assert!(stored.ensemble.is_none());
        assert_eq!(stored.into_artifact().unwrap(), artifact);
    }

    #[test]
    fn test_missing_parameters_rejected() {
        let mut stored = StoredArtifact::from_artifact(&linear_artifact()).unwrap();
        stored.coefficients = None;
        assert!(matches!(
            stored.into_artifact(),
            Err(StorageError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_save_and_reload() {
        let archive = SqliteArchive::connect("sqlite::memory:").await.unwrap();
        let linear = linear_artifact();
        let mut forest = linear_artifact();
        forest.id = Uuid::new_v4();
        forest.model_kind = ModelKind::RandomForest;
        forest.parameters = ModelParameters::Ensemble {
            blob: vec![1, 2, 3, 4],
        };
        forest.created_at = linear.created_at + chrono::Duration::seconds(1);

        archive.save(&linear).await.unwrap();
        archive.save(&forest).await.unwrap();
        archive.save(&linear).await.unwrap();
        assert_eq!(archive.count().await.unwrap(), 2);

        let loaded = archive.load_all().await.unwrap();
        assert_eq!(loaded, vec![linear, forest]);
    }

    #[tokio::test]
    async fn test_invalid_rows_are_skipped() {
        let archive = SqliteArchive::connect("sqlite::memory:").await.unwrap();
        let mut broken = linear_artifact();
        broken.parameters = ModelParameters::Linear {
            coefficients: vec![1.0],
            intercept: 0.0,
        };
        archive.save(&broken).await.unwrap();
        archive.save(&linear_artifact()).await.unwrap();

        assert_eq!(archive.load_all().await.unwrap().len(), 1);
        assert!(archive.load(&broken.id).await.is_err());
    }

    #[tokio::test]
    async fn test_load_by_id() {
        let archive = SqliteArchive::connect("sqlite::memory:").await.unwrap();
        let artifact = linear_artifact();
        archive.save(&artifact).await.unwrap();

        assert_eq!(archive.load(&artifact.id).await.unwrap(), Some(artifact));
        assert_eq!(archive.load(&Uuid::new_v4()).await.unwrap(), None);
    }
}
