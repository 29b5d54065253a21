//! Dataset Routes

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use dataset::{column_type_of, read_csv_bytes, ColumnType};
use feature_engine::{numeric_values, ColumnChart};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::DatasetRecord;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub owner: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub dataset_id: Uuid,
    pub headers: Vec<String>,
    /// Rows in the upload
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ChartsResponse {
    pub dataset_id: Uuid,
    pub row_count: usize,
    /// Rows the charts were computed from
    pub sample_rows: usize,
    pub charts: Vec<ColumnChart>,
}

/// Store a CSV upload's headers, row count and sample
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("CSV body is required".to_string()));
    }

    let dataset = tokio::task::spawn_blocking(move || read_csv_bytes(&body))
        .await
        .map_err(|e| ApiError::Internal(format!("upload task failed: {}", e)))??;

    let sample_rows = state.repository.config().dataset_sample_rows;
    let record = DatasetRecord::from_dataset(&dataset, params.owner, sample_rows);
    let response = UploadResponse {
        dataset_id: record.id,
        headers: record.headers.clone(),
        count: record.row_count,
    };
    state.repository.insert_dataset(record)?;

    info!(
        "Stored dataset {} ({} rows, {} columns)",
        response.dataset_id,
        response.count,
        response.headers.len()
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Histogram and mean for every numeric column of the stored sample
pub async fn get_charts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChartsResponse>> {
    let record = state.repository.get_dataset(&id)?;

    let charts = record
        .headers
        .iter()
        .filter_map(|name| {
            let cells = record.column(name);
            if column_type_of(cells.iter()) != ColumnType::Numeric {
                return None;
            }
            let values = numeric_values(&cells);
            Some(ColumnChart::build(name.clone(), &values))
        })
        .collect();

    Ok(Json(ChartsResponse {
        dataset_id: record.id,
        row_count: record.row_count,
        sample_rows: record.sample.len(),
        charts,
    }))
}
