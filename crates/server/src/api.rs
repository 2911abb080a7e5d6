//! HTTP API for predictions, health checks and Prometheus metrics

use crate::error::{ApiError, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pipeline_lib::{LoadedModel, PipelineLogger, ServiceMetrics, TrainedModel};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Shared application state
///
/// The model is loaded once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<TrainedModel>,
    pub model_key: String,
    pub checksum: String,
    /// Feature count the configured dataset schema implies, when known
    pub expected_features: Option<usize>,
    pub metrics: ServiceMetrics,
    pub logger: PipelineLogger,
}

impl AppState {
    pub fn new(model: TrainedModel, model_key: impl Into<String>, checksum: impl Into<String>) -> Self {
        let state = Self {
            model: Arc::new(model),
            model_key: model_key.into(),
            checksum: checksum.into(),
            expected_features: None,
            metrics: ServiceMetrics::new(),
            logger: PipelineLogger::new("prediction-server"),
        };
        state
            .metrics
            .set_model(&state.model_key, &state.checksum, state.model.n_features());
        state
    }

    pub fn from_loaded(loaded: LoadedModel) -> Self {
        Self::new(loaded.model, loaded.source.key, loaded.checksum)
    }

    /// Record the feature count the configuration expects; `/healthz`
    /// reports a mismatch with the served model
    pub fn with_expected_features(mut self, expected: usize) -> Self {
        self.expected_features = Some(expected);
        self
    }

    fn schema_matches(&self) -> bool {
        self.expected_features
            .map_or(true, |expected| expected == self.model.n_features())
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub prediction: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_key: String,
    pub checksum: String,
    pub features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_features: Option<usize>,
    pub trained_at: i64,
}

/// Predict the class of a single feature vector
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Vec<f64>>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let start = Instant::now();

    let outcome = payload
        .map_err(ApiError::from)
        .and_then(|Json(features)| {
            state
                .model
                .predict_one(&features)
                .map(|prediction| (features.len(), prediction))
                .map_err(ApiError::from)
        });

    match outcome {
        Ok((n_features, prediction)) => {
            let elapsed = start.elapsed().as_secs_f64();
            state.metrics.observe_prediction_latency(elapsed);
            state.metrics.inc_predictions();
            state.logger.log_prediction(n_features, prediction, elapsed);
            Ok(Json(PredictionResponse { prediction }))
        }
        Err(err) => {
            state.metrics.inc_prediction_errors();
            state.logger.log_prediction_rejected(&err.to_string());
            Err(err)
        }
    }
}

/// Health check response with the artifact being served
///
/// Answers 503 when the model's width disagrees with the configured schema.
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status_code, status) = if state.schema_matches() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "schema_mismatch")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            model_key: state.model_key.clone(),
            checksum: state.checksum.clone(),
            features: state.model.n_features(),
            expected_features: state.expected_features,
            trained_at: state.model.trained_at(),
        }),
    )
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until Ctrl-C
pub async fn serve(bind_addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %bind_addr, "Starting prediction API");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
