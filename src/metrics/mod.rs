// src/metrics/mod.rs
// Prometheus metrics for the orchestrator.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Global Prometheus handle for metrics rendering
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Active WebSocket connections counter
static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    PROMETHEUS_HANDLE
        .set(handle)
        .expect("Prometheus handle already initialized");

    info!("Prometheus metrics initialized");
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Record a model-inference call (spec 4.6).
pub fn record_inference_call(model: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("orchestrator_inference_calls_total", "model" => model.to_string(), "status" => status)
        .increment(1);
}

/// Record tokens used in an inference response.
pub fn record_tokens(input_tokens: u64, output_tokens: u64) {
    counter!("orchestrator_inference_tokens_total", "type" => "input").increment(input_tokens);
    counter!("orchestrator_inference_tokens_total", "type" => "output").increment(output_tokens);
}

/// Track active WebSocket connections.
pub fn connection_opened() {
    let count = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    gauge!("orchestrator_active_connections").set(count as f64);
}

/// Track closed WebSocket connections.
pub fn connection_closed() {
    let count = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
    gauge!("orchestrator_active_connections").set(count as f64);
}

/// Record one sandbox command execution (spec 4.5, 4.8 commands sub-algorithm).
pub fn record_command_execution(success: bool, duration_seconds: f64) {
    let status = if success { "success" } else { "error" };
    counter!("orchestrator_commands_executed_total", "status" => status).increment(1);
    histogram!("orchestrator_command_duration_seconds").record(duration_seconds);
}

/// Record a generateAllFiles run's outcome (spec 4.8).
pub fn record_generation_run(outcome: &str, duration_seconds: f64) {
    counter!("orchestrator_generation_runs_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("orchestrator_generation_duration_seconds").record(duration_seconds);
}

/// Helper for timing a generation run; records on drop.
pub struct GenerationTimer {
    start: Instant,
}

impl GenerationTimer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn finish(self, outcome: &str) {
        record_generation_run(outcome, self.start.elapsed().as_secs_f64());
    }
}

impl Default for GenerationTimer {
    fn default() -> Self {
        Self::new()
    }
}
