//! Storage Layer
//!
//! In-memory repository for artifacts, datasets and predictions, with an
//! optional SQLite archive that keeps artifacts across restarts.

mod archive;
mod config;
mod repository;

pub use archive::{SqliteArchive, StoredArtifact};
pub use config::StorageConfig;
pub use repository::{DatasetRecord, PredictionRecord, Repository};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::SerializationError(e.to_string())
    }
}

impl From<postcard::Error> for StorageError {
    fn from(e: postcard::Error) -> Self {
        StorageError::SerializationError(e.to_string())
    }
}
