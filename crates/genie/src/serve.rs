//! HTTP server wiring.

use std::sync::Arc;

use anyhow::{Context, Result};
use genieconf::GenieConfig;
use genieparams::{ParameterCatalog, ToolRegistry};
use geniedispatch::{
    ChatClient, DispatchPipeline, LlmPromptClassifier, LlmRoutingDecider, LlmSoundDesigner,
    SqliteUsageTracker, UsageStore,
};
use tracing::info;

use crate::web::{self, AppState};

/// Build the pipeline with the language-model collaborators and the SQLite
/// usage store described by `config`.
pub fn build_pipeline(config: &GenieConfig) -> Result<DispatchPipeline> {
    let catalog = ParameterCatalog::digitone().context("Parameter catalog is inconsistent")?;
    let registry = Arc::new(ToolRegistry::from_catalog(&catalog));

    let db_path = config.paths.usage_db_path();
    let store = UsageStore::open(&db_path)
        .with_context(|| format!("Failed to open usage database at {}", db_path.display()))?;

    if config.model.api_key.is_none() {
        tracing::warn!("No model API key configured; model calls will likely be rejected");
    }
    let client = ChatClient::from_config(&config.model);

    Ok(DispatchPipeline::new(
        config.dispatch.clone(),
        Arc::clone(&registry),
        Arc::new(LlmPromptClassifier::new(client.clone(), &config.model)),
        Arc::new(LlmRoutingDecider::new(client.clone(), &config.model)),
        Arc::new(LlmSoundDesigner::new(client, registry, &config.model)),
        Arc::new(SqliteUsageTracker::new(store)),
    ))
}

/// Run the HTTP server until SIGINT or SIGTERM.
pub async fn run(config: GenieConfig) -> Result<()> {
    info!("SynthGenie starting");

    let pipeline = build_pipeline(&config)?;
    info!(
        tools = pipeline.registry().len(),
        model = %config.model.model,
        router_model = %config.model.router_model(),
        usage_db = %config.paths.usage_db_path().display(),
        "Pipeline ready"
    );

    if config.auth.is_open() {
        tracing::warn!("No admin or registered API keys configured; any X-API-Key is accepted");
    }
    let app = web::router(AppState::new(Arc::new(pipeline)).with_auth(config.auth.clone()));

    let addr = config.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("   Prompt: POST http://{}/agent/digitone/prompt", addr);
    info!("   Tools: GET http://{}/tools", addr);
    info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
