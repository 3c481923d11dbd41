//! Document QA Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use docqa_agent::PipelineServices;
use docqa_config::{load_settings, Settings};
use docqa_llm::LlmFactory;
use docqa_rag::HybridIndex;
use docqa_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("DOCQA_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&config);

    tracing::info!("Starting docqa server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_path = env.as_deref().unwrap_or("default"),
        provider = %config.llm.provider,
        response_model = %config.llm.response_model(),
        rerank_model = %config.llm.rerank_model(),
        "Configuration loaded"
    );

    let services = init_services(&config)?;
    let mut state = AppState::new(config.clone(), services);

    if config.observability.metrics_enabled {
        let handle = init_metrics()?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
        state = state.with_metrics(handle);
    }

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Build every shared service once; requests only borrow them
fn init_services(config: &Settings) -> Result<PipelineServices, Box<dyn std::error::Error>> {
    let index = HybridIndex::from_config(&config.index)?;
    let (response_llm, rerank_llm) = LlmFactory::from_settings(&config.llm)?;
    let audit = docqa_persistence::init(&config.audit);

    tracing::info!(
        index = %config.index.collection,
        audit_dir = %config.audit.log_dir,
        "Services initialized"
    );

    Ok(PipelineServices {
        index: Arc::new(index),
        response_llm,
        rerank_llm,
        audit: Arc::new(audit),
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("{level},tower_http=debug").into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
