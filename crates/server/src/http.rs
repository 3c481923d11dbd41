//! HTTP Endpoints
//!
//! REST API for the QA pipeline.

use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/api/ask", post(ask))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// No configured origins means permissive.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub request_id: Uuid,
    pub answer: String,
    pub cache_hit: bool,
    /// Chunk ids handed to the answer model; empty on a cache hit
    pub context: Vec<String>,
}

/// `POST /api/ask`
async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ServerError> {
    if request.question.trim().is_empty() {
        return Err(ServerError::InvalidRequest("question must not be empty".to_string()));
    }

    let output = state.pipeline.answer(&request.question).await?;

    Ok(Json(AskResponse {
        request_id: output.request_id,
        answer: output.answer,
        cache_hit: output.cache_hit,
        context: output
            .state
            .reranked_context
            .iter()
            .map(|chunk| chunk.source_label().to_string())
            .collect(),
    }))
}

/// Liveness
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness: both model backends must answer within the probe timeout
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let services = &state.services;

    let (response_ok, rerank_ok) = tokio::join!(
        probe(services.response_llm.is_available()),
        probe(services.rerank_llm.is_available()),
    );

    let ready = response_ok && rerank_ok;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "checks": {
                "response_llm": {
                    "model": services.response_llm.model_name(),
                    "status": if response_ok { "ok" } else { "unavailable" },
                },
                "rerank_llm": {
                    "model": services.rerank_llm.model_name(),
                    "status": if rerank_ok { "ok" } else { "unavailable" },
                },
                "index": { "backend": services.index.name() },
            }
        })),
    )
}

async fn probe(check: impl std::future::Future<Output = bool>) -> bool {
    tokio::time::timeout(READINESS_TIMEOUT, check)
        .await
        .unwrap_or(false)
}
