//! Observability infrastructure for the estimator
//!
//! Provides:
//! - Prometheus metrics (prediction latency, training latency, outcomes, model state)
//! - Structured logging of estimation events with tracing

use crate::models::{BufferRecommendation, Prediction, TrainingReport};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EstimatorMetricsInner> = OnceLock::new();

struct EstimatorMetricsInner {
    prediction_latency_seconds: Histogram,
    training_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounter,
    training_runs_total: IntCounterVec,
    training_samples: IntGauge,
    model_trained: IntGauge,
}

impl EstimatorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "pm_estimation_prediction_latency_seconds",
                "Time spent producing a story point prediction",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            training_latency_seconds: register_histogram!(
                "pm_estimation_training_latency_seconds",
                "Time spent training the estimation model",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register training_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "pm_estimation_predictions_total",
                "Predictions generated, by estimation method",
                &["method"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter!(
                "pm_estimation_prediction_errors_total",
                "Predictions that failed"
            )
            .expect("Failed to register prediction_errors_total"),

            training_runs_total: register_int_counter_vec!(
                "pm_estimation_training_runs_total",
                "Training attempts, by outcome",
                &["outcome"]
            )
            .expect("Failed to register training_runs_total"),

            training_samples: register_int_gauge!(
                "pm_estimation_training_samples",
                "Number of tasks used by the last successful training run"
            )
            .expect("Failed to register training_samples"),

            model_trained: register_int_gauge!(
                "pm_estimation_model_trained",
                "1 when a trained model is loaded, 0 while using the rule-based fallback"
            )
            .expect("Failed to register model_trained"),
        }
    }
}

/// Estimator metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct EstimatorMetrics {
    _private: (),
}

impl Default for EstimatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimatorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EstimatorMetricsInner {
        GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_training_latency(&self, duration_secs: f64) {
        self.inner().training_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, method: &str) {
        self.inner()
            .predictions_total
            .with_label_values(&[method])
            .inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    /// Record a training attempt (`trained`, `insufficient_data`, `failed`)
    pub fn inc_training_runs(&self, outcome: &str) {
        self.inner()
            .training_runs_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn set_training_samples(&self, samples: i64) {
        self.inner().training_samples.set(samples);
    }

    pub fn set_model_trained(&self, trained: bool) {
        self.inner().model_trained.set(i64::from(trained));
    }
}

/// Render every registered metric in the Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Structured logger for estimation events
///
/// Provides consistent structured logging for training, predictions and
/// model persistence.
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_trained: bool) {
        info!(
            event = "estimator_started",
            component = %self.component,
            version = %version,
            model_trained = model_trained,
            "Estimator started"
        );
    }

    pub fn log_prediction(&self, task_id: &str, prediction: &Prediction) {
        info!(
            event = "prediction_generated",
            component = %self.component,
            task_id = %task_id,
            predicted_points = prediction.predicted_points,
            confidence = prediction.confidence,
            method = %prediction.method,
            complexity_score = prediction.complexity_score,
            raw_prediction = ?prediction.raw_prediction,
            "Generated story point prediction"
        );
    }

    pub fn log_buffer(&self, task_id: &str, recommendation: &BufferRecommendation) {
        info!(
            event = "buffer_suggested",
            component = %self.component,
            task_id = %task_id,
            base_estimate = recommendation.base_estimate,
            buffer_points = recommendation.buffer_points,
            total_estimate = recommendation.total_estimate,
            buffer_percentage = recommendation.buffer_percentage,
            "Suggested schedule buffer"
        );
    }

    pub fn log_model_trained(&self, report: &TrainingReport) {
        info!(
            event = "model_trained",
            component = %self.component,
            samples = report.samples,
            r2_score = report.r2_score,
            mae = report.mae,
            feature_count = report.feature_count,
            "Estimation model trained"
        );
    }

    pub fn log_training_skipped(&self, found: usize, required: usize) {
        warn!(
            event = "training_skipped",
            component = %self.component,
            found = found,
            required = required,
            "Not enough estimated tasks, keeping previous model"
        );
    }

    pub fn log_model_saved(&self, path: &Path, checksum: &str) {
        info!(
            event = "model_saved",
            component = %self.component,
            path = %path.display(),
            checksum = %checksum,
            "Estimation model saved"
        );
    }

    pub fn log_model_load(&self, path: &Path, error: Option<&str>) {
        match error {
            None => info!(
                event = "model_loaded",
                component = %self.component,
                path = %path.display(),
                "Estimation model loaded"
            ),
            Some(error) => warn!(
                event = "model_load_failed",
                component = %self.component,
                path = %path.display(),
                error = %error,
                "Failed to load model artifact, keeping previous model"
            ),
        }
    }
}
