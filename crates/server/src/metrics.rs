//! Prometheus metrics
//!
//! Counters and histograms are recorded where the work happens, through the
//! `metrics` facade. This module installs the exporter and serves the text
//! exposition format.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;
use crate::ServerError;

/// Stage latency buckets in seconds
const STAGE_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Install the global Prometheus recorder
///
/// Must be called at most once per process.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    let handle = builder()?
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

    describe();
    Ok(handle)
}

/// Recorder handle that is not installed globally
pub fn detached_handle() -> Result<PrometheusHandle, ServerError> {
    Ok(builder()?.build_recorder().handle())
}

fn builder() -> Result<PrometheusBuilder, ServerError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("docqa_stage_duration_seconds".to_string()),
            STAGE_BUCKETS,
        )
        .map_err(|e| ServerError::Metrics(e.to_string()))
}

fn describe() {
    metrics::describe_counter!("docqa_requests_total", "Questions received by the pipeline");
    metrics::describe_counter!("docqa_cache_hits_total", "Questions answered from the audit log");
    metrics::describe_counter!("docqa_cache_misses_total", "Questions that ran the full pipeline");
    metrics::describe_counter!(
        "docqa_rerank_fallbacks_total",
        "Rerank calls that fell back to fusion order"
    );
    metrics::describe_counter!(
        "docqa_generation_errors_total",
        "Answer generations that ended in an error record"
    );
    metrics::describe_counter!(
        "docqa_pipeline_errors_total",
        "Requests aborted by a rewrite or retrieval failure"
    );
    metrics::describe_histogram!(
        "docqa_stage_duration_seconds",
        metrics::Unit::Seconds,
        "Wall time per pipeline stage"
    );
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics disabled\n".to_string(),
        ),
    }
}
