//! Observability infrastructure for the pipeline
//!
//! Provides:
//! - Prometheus metrics for the prediction service (latency, counts, model info)
//! - Structured JSON-friendly event logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounter,
    model_info: GaugeVec,
    model_features: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "prediction_service_latency_seconds",
                "Time spent running model inference for a request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "prediction_service_predictions_total",
                "Total number of predictions served"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter!(
                "prediction_service_prediction_errors_total",
                "Total number of rejected or failed prediction requests"
            )
            .expect("Failed to register prediction_errors_total"),

            model_info: register_gauge_vec!(
                "prediction_service_model_info",
                "Information about the currently loaded model artifact",
                &["key", "checksum"]
            )
            .expect("Failed to register model_info"),

            model_features: register_int_gauge!(
                "prediction_service_model_features",
                "Number of input features the loaded model expects"
            )
            .expect("Failed to register model_features"),
        }
    }
}

/// Prediction service metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    /// Record the loaded artifact, replacing any previous one
    pub fn set_model(&self, key: &str, checksum: &str, n_features: usize) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[key, checksum])
            .set(1.0);
        self.inner().model_features.set(n_features as i64);
    }
}

/// Structured logger for pipeline events
///
/// Keeps event names and field sets consistent between the trainer, the
/// client driver and the prediction service.
#[derive(Clone)]
pub struct PipelineLogger {
    component: String,
}

impl PipelineLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "component_started",
            component = %self.component,
            version = %version,
            "Component started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "component_shutdown",
            component = %self.component,
            reason = %reason,
            "Component shutting down"
        );
    }

    pub fn log_training_completed(&self, accuracy: f64, train_rows: usize, test_rows: usize) {
        info!(
            event = "training_completed",
            component = %self.component,
            accuracy = accuracy,
            train_rows = train_rows,
            test_rows = test_rows,
            "Model is trained. Accuracy: {:.3}%",
            accuracy * 100.0
        );
    }

    pub fn log_publish_skipped(&self, reason: &str) {
        warn!(
            event = "model_publish_ignored",
            component = %self.component,
            reason = %reason,
            "Publish failed, continuing because failures are allowed"
        );
    }

    pub fn log_prediction(&self, n_features: usize, prediction: i64, latency_secs: f64) {
        info!(
            event = "prediction_served",
            component = %self.component,
            features = n_features,
            prediction = prediction,
            latency_us = (latency_secs * 1_000_000.0) as u64,
            "Prediction served"
        );
    }

    pub fn log_prediction_rejected(&self, reason: &str) {
        warn!(
            event = "prediction_rejected",
            component = %self.component,
            reason = %reason,
            "Prediction request rejected"
        );
    }

    pub fn log_client_request(&self, url: &str, features: &[f64]) {
        info!(
            event = "prediction_requested",
            component = %self.component,
            url = %url,
            features = ?features,
            "Posting feature vector"
        );
    }
}
