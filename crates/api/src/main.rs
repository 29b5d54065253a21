//! Tabular model server entry point

use anyhow::Context;
use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_logging(&config.logging).context("failed to install tracing subscriber")?;

    info!("=== Tabular Engine v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Engine: {} folds, seed {}, {} trees",
        config.engine.folds, config.engine.seed, config.engine.n_estimators
    );

    run_server(config).await
}
