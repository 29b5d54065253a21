//! Model Routes: training, listing, metadata and the catalog

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use dataset::read_csv_bytes;
use feature_engine::TaskKind;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use training_engine::{
    ModelArtifact, ModelKind, ModelPreference, TrainingOutcome, TrainingRequest, TrainingSummary,
};
use uuid::Uuid;

use super::{default_limit, MAX_LIMIT};
use crate::error::{ApiError, Result};
use crate::AppState;

/// Feature columns hidden from the catalog's input forms
const ID_COLUMNS: [&str; 3] = ["student_id", "studentid", "id"];

/// Targets never offered in the catalog
const HIDDEN_TARGETS: [&str; 1] = ["predicted_category"];

#[derive(Debug, Default, Deserialize)]
pub struct TrainQuery {
    /// Target column; defaults to the last column
    pub target: Option<String>,
    /// `rf` requests a random forest
    pub model: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Input form field for one feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Categorical { options: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_id: Uuid,
    pub target: String,
    pub task: TaskKind,
    pub model_kind: ModelKind,
    pub validation_score: Option<f64>,
    pub rows_used: usize,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ModelArtifact> for ModelInfo {
    fn from(artifact: &ModelArtifact) -> Self {
        Self {
            model_id: artifact.id,
            target: artifact.target_name.clone(),
            task: artifact.task,
            model_kind: artifact.model_kind,
            validation_score: artifact.validation_score,
            rows_used: artifact.rows_used,
            owner: artifact.owner.clone(),
            created_at: artifact.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMeta {
    #[serde(flatten)]
    pub info: ModelInfo,
    pub feature_columns: Vec<String>,
    pub fields: Vec<FieldSpec>,
}

impl ModelMeta {
    /// Metadata with a field per feature, minus those `hide` rejects
    fn build(artifact: &ModelArtifact, hide: impl Fn(&str) -> bool) -> Self {
        let encoders = artifact.encoder_classes();
        let fields = artifact
            .feature_order
            .iter()
            .filter(|name| !hide(name.as_str()))
            .map(|name| FieldSpec {
                name: name.clone(),
                kind: match encoders.get(name) {
                    Some(classes) => FieldKind::Categorical {
                        options: classes.clone(),
                    },
                    None => FieldKind::Number,
                },
            })
            .collect();

        Self {
            info: ModelInfo::from(artifact),
            feature_columns: artifact.feature_order.clone(),
            fields,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub data: Vec<ModelInfo>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub models: Vec<ModelMeta>,
}

fn is_id_column(name: &str) -> bool {
    ID_COLUMNS.contains(&name.trim().to_lowercase().as_str())
}

/// Train on a CSV body and store the artifact
pub async fn train_model(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrainQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<TrainingSummary>)> {
    if body.is_empty() {
        return Err(ApiError::BadRequest(
            "CSV file is required for training".to_string(),
        ));
    }

    let request = TrainingRequest {
        target: params.target.filter(|t| !t.trim().is_empty()),
        model: ModelPreference::from_request(params.model.as_deref()),
        owner: params.owner,
    };
    let pipeline = Arc::clone(&state.pipeline);
    let started = Instant::now();

    let outcome = tokio::task::spawn_blocking(move || -> Result<TrainingOutcome> {
        let dataset = read_csv_bytes(&body)?;
        Ok(pipeline.run(dataset, &request)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("training task failed: {}", e)))?;

    let TrainingOutcome { artifact, summary } = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            counter!("tabular_trainings_total", "status" => "failed").increment(1);
            warn!("Training failed: {}", e);
            return Err(e);
        }
    };

    histogram!("tabular_training_seconds").record(started.elapsed().as_secs_f64());
    counter!(
        "tabular_trainings_total",
        "status" => "ok",
        "model_kind" => artifact.model_kind.as_str()
    )
    .increment(1);

    if let Some(archive) = &state.archive {
        archive.save(&artifact).await?;
    }
    let artifact = state.repository.insert_artifact(artifact)?;

    info!(
        "Trained {} model {} for target '{}' on {} rows",
        artifact.model_kind.as_str(),
        artifact.id,
        artifact.target_name,
        artifact.rows_used
    );
    Ok((StatusCode::CREATED, Json(summary)))
}

/// List models, newest first
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ModelListResponse>> {
    let limit = params.limit.min(MAX_LIMIT);
    let data: Vec<ModelInfo> = state
        .repository
        .list_artifacts(params.owner.as_deref(), limit)?
        .iter()
        .map(|a| ModelInfo::from(a.as_ref()))
        .collect();

    Ok(Json(ModelListResponse {
        count: data.len(),
        data,
    }))
}

/// Feature fields and scores of one model
pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ModelMeta>> {
    let artifact = state.resolve_artifact(&id).await?;
    Ok(Json(ModelMeta::build(&artifact, |_| false)))
}

/// Newest model per target, as input forms
pub async fn get_catalog(State(state): State<Arc<AppState>>) -> Result<Json<CatalogResponse>> {
    let models: Vec<ModelMeta> = state
        .repository
        .latest_per_target()?
        .iter()
        .filter(|a| {
            let target = a.target_name.trim().to_lowercase();
            !target.is_empty() && !HIDDEN_TARGETS.contains(&target.as_str())
        })
        .map(|a| ModelMeta::build(a, is_id_column))
        .collect();

    if models.is_empty() {
        return Err(ApiError::NotFound("No trained models available".to_string()));
    }
    Ok(Json(CatalogResponse { models }))
}
