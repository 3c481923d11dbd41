//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use docqa_agent::{PipelineServices, QaPipeline};
use docqa_config::Settings;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub pipeline: Arc<QaPipeline>,
    /// Kept for readiness probes
    pub services: PipelineServices,
    /// `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the pipeline over already-constructed services
    pub fn new(config: Settings, services: PipelineServices) -> Self {
        let pipeline = QaPipeline::new(services.clone(), config.retrieval.clone());
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            services,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
