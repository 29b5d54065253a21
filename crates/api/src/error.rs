//! HTTP Error Mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dataset::DatasetError;
use inference_engine::InferenceError;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;
use training_engine::TrainingError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Dataset(DatasetError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Dataset(_) => StatusCode::BAD_REQUEST,
            ApiError::Training(TrainingError::Timeout(_)) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Training(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Inference(InferenceError::InvalidInputShape { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Inference(InferenceError::CorruptArtifact(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(detail = %self, "Request failed");
            match &self {
                ApiError::Training(_) => "Training failed. Check server logs for details.".to_string(),
                ApiError::Inference(_) => "Model artifact is unusable.".to_string(),
                _ => "An internal error occurred".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(TrainingError::InvalidTarget("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TrainingError::Timeout(120)).status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            ApiError::from(TrainingError::Solver("singular".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(InferenceError::InvalidInputShape {
                expected: 3,
                actual: 2
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::NotFound("dataset".into())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let response = ApiError::Internal("lock poisoned at 0x1f".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
