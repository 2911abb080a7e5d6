//! Prediction server
//!
//! Loads the newest model artifact from the configured store once at
//! startup and serves `POST /predict`.

use anyhow::{Context, Result};
use pipeline_lib::{build_store, fetch_latest_model, PipelineConfig, PipelineLogger};
use prediction_server::{serve, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let logger = PipelineLogger::new("prediction-server");
    logger.log_startup(SERVER_VERSION);

    let config = PipelineConfig::from_env().context("failed to load configuration")?;

    let store = build_store(&config.storage)
        .await
        .context("failed to initialise artifact store")?;
    info!(location = %store.location(), prefix = %config.storage.prefix, "Artifact store configured");

    // Without a model there is nothing to serve
    let loaded = fetch_latest_model(store.as_ref(), &config)
        .await
        .context("failed to load the latest model")?;

    let expected = config.feature_count();
    if loaded.model.n_features() != expected {
        warn!(
            model_features = loaded.model.n_features(),
            configured_features = expected,
            "Model width differs from the configured dataset schema"
        );
    }

    let state = Arc::new(AppState::from_loaded(loaded).with_expected_features(expected));
    serve(&config.server.bind_addr, state).await?;

    logger.log_shutdown("SIGINT received");
    Ok(())
}
