//! Prediction Routes

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use dataset::RawValue;
use feature_engine::{EncodingFallback, TaskKind};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::PredictionRecord;
use training_engine::PredictedValue;
use tracing::{info, warn};
use uuid::Uuid;

use super::{default_limit, MAX_LIMIT};
use crate::error::{ApiError, Result};
use crate::AppState;

/// Query parameters for the prediction history
#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    /// Restrict to one model
    pub model_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction_id: i64,
    pub model_id: Uuid,
    pub prediction: PredictedValue,
    pub confidence: Option<f64>,
    pub target_name: String,
    pub task: TaskKind,
    pub input_vector: BTreeMap<String, f64>,
    pub fallbacks: Vec<EncodingFallback>,
    pub latency_ms: u64,
}

/// Response for the history endpoint
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub data: Vec<PredictionRecord>,
    pub count: usize,
}

/// Raw cell from a JSON input value; nothing here is rejected
fn raw_value(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Missing,
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(RawValue::Number)
            .unwrap_or(RawValue::Missing),
        Value::String(s) => RawValue::from_cell(s),
        Value::Bool(b) => RawValue::Text(b.to_string()),
        other => RawValue::Text(other.to_string()),
    }
}

/// Row of raw cells from a request body
///
/// An empty body or a JSON value other than an object yields an empty row,
/// so every feature takes its default. Only text that is not JSON is refused.
fn input_row(body: &[u8]) -> Result<BTreeMap<String, RawValue>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("prediction input is not JSON: {}", e)))?;

    match payload {
        Value::Object(fields) => Ok(fields
            .iter()
            .map(|(k, v)| (k.clone(), raw_value(v)))
            .collect()),
        other => {
            warn!("Prediction input is not a JSON object ({}), using defaults", json_kind(&other));
            Ok(BTreeMap::new())
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Predict with a stored model from a JSON object of raw inputs
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<PredictResponse>> {
    let row = input_row(&body)?;
    let artifact = state.resolve_artifact(&id).await?;

    let result = state.inference.predict(&artifact, &row)?;
    info!(
        "Model {} predicted {} for target '{}'",
        id, result.prediction.value, result.prediction.target_name
    );
    let prediction = result.prediction;
    counter!("tabular_predictions_total", "task" => prediction.task.as_str()).increment(1);

    let prediction_id = state.repository.insert_prediction(PredictionRecord {
        id: 0,
        model_id: prediction.model_id,
        target_name: prediction.target_name.clone(),
        value: prediction.value.clone(),
        confidence: prediction.confidence,
        input: row,
        fallbacks: prediction.fallbacks.clone(),
        created_at: Utc::now(),
    })?;

    Ok(Json(PredictResponse {
        prediction_id,
        model_id: prediction.model_id,
        prediction: prediction.value,
        confidence: prediction.confidence,
        target_name: prediction.target_name,
        task: prediction.task,
        input_vector: prediction.input_vector,
        fallbacks: prediction.fallbacks,
        latency_ms: result.latency_ms,
    }))
}

/// Get predictions, newest first
pub async fn get_predictions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictionQuery>,
) -> Result<Json<PredictionResponse>> {
    let limit = params.limit.min(MAX_LIMIT);
    let data = state.repository.get_predictions(params.model_id, limit)?;

    Ok(Json(PredictionResponse {
        count: data.len(),
        data,
    }))
}
