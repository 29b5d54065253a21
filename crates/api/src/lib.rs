//! Tabular Model API Server
//!
//! HTTP surface over the training pipeline, the inference engine and the
//! artifact repository.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use inference_engine::InferenceEngine;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{Repository, SqliteArchive, StorageError};
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use training_engine::{ModelArtifact, TrainingPipeline};
use uuid::Uuid;

pub mod error;
pub mod rate_limit;
mod routes;
pub mod settings;

pub use error::ApiError;
pub use settings::{AppConfig, LoggingConfig, ServerConfig};

/// Application state shared across handlers
pub struct AppState {
    pub repository: Arc<Repository>,
    pub pipeline: Arc<TrainingPipeline>,
    pub inference: InferenceEngine,
    /// Write-through archive, when a database URL is configured
    pub archive: Option<SqliteArchive>,
    pub metrics: Option<PrometheusHandle>,
    pub config: AppConfig,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            repository: Arc::new(Repository::new(config.storage.clone())),
            pipeline: Arc::new(TrainingPipeline::new(config.engine.clone())),
            inference: InferenceEngine::new(),
            archive: None,
            metrics: None,
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn with_archive(mut self, archive: SqliteArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Artifact by id, falling back to the archive when memory has evicted it
    ///
    /// An archived hit is put back into the repository.
    pub async fn resolve_artifact(&self, id: &Uuid) -> Result<Arc<ModelArtifact>, ApiError> {
        match self.repository.get_artifact(id) {
            Err(StorageError::NotFound(missing)) => {
                let Some(archive) = &self.archive else {
                    return Err(StorageError::NotFound(missing).into());
                };
                match archive.load(id).await? {
                    Some(artifact) => {
                        debug!("Model {} restored from archive", id);
                        Ok(self.repository.insert_artifact(artifact)?)
                    }
                    None => Err(StorageError::NotFound(missing).into()),
                }
            }
            found => Ok(found?),
        }
    }

    /// Load archived artifacts into the repository
    pub async fn restore_artifacts(&self) -> Result<usize, ApiError> {
        let Some(archive) = &self.archive else {
            return Ok(0);
        };
        let artifacts = archive.load_all().await?;
        let restored = artifacts.len();
        for artifact in artifacts {
            self.repository.insert_artifact(artifact)?;
        }
        Ok(restored)
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub repository: ComponentHealth,
    pub archive: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
}

impl ComponentHealth {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Repository counters
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub artifact_count: usize,
    pub prediction_count: usize,
}

/// Create the application router
///
/// Rate limiting is layered on in [`run_server`], which has the peer
/// addresses the limiter keys on.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/datasets", post(routes::datasets::upload_dataset))
        .route("/api/v1/datasets/:id/charts", get(routes::datasets::get_charts))
        .route(
            "/api/v1/models",
            post(routes::models::train_model).get(routes::models::list_models),
        )
        .route("/api/v1/models/:id", get(routes::models::get_model))
        .route("/api/v1/models/:id/predict", post(routes::predictions::predict))
        .route("/api/v1/catalog", get(routes::models::get_catalog))
        .route("/api/v1/predictions", get(routes::predictions::get_predictions))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let archive = if state.archive.is_some() { "ok" } else { "disabled" };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            repository: ComponentHealth::new("ok"),
            archive: ComponentHealth::new(archive),
        },
        metrics: SystemMetrics {
            artifact_count: state.repository.artifact_count(),
            prediction_count: state.repository.prediction_count(),
        },
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Build state from configuration, restore archived artifacts and serve
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let mut state = AppState::new(config.clone());

    if let Some(url) = &config.storage.database_url {
        state = state.with_archive(SqliteArchive::connect(url).await?);
    }
    if config.server.metrics_enabled {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => state = state.with_metrics(handle),
            Err(e) => warn!("Metrics exporter not installed: {}", e),
        }
    }

    let restored = state.restore_artifacts().await?;
    if restored > 0 {
        info!("Restored {} artifacts from archive", restored);
    }

    let mut app = create_router(Arc::new(state));
    if config.rate_limit.enabled {
        if let Some(governor) = rate_limit::create_governor_config(&config.rate_limit) {
            rate_limit::spawn_limiter_cleanup(&governor, Duration::from_secs(60));
            app = app.layer(GovernorLayer { config: governor });
        }
    }

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
