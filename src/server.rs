/// Server setup and initialization
///
/// Wires together all components: workflow registry, request store, engine,
/// and HTTP routes.

use crate::{
    api::{create_request_routes, create_workflow_routes, AppState},
    config::Config,
    request::{gateway::PersistenceGateway, memory::InMemoryGateway, storage::SqliteGateway},
    runtime::WorkflowEngine,
    workflow::registry::WorkflowRegistry,
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes
///
/// Registers the built-in catalog plus any definitions file, opens the
/// request store, and builds the HTTP router around the engine.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📊 Initializing workflow registry");
    let registry = WorkflowRegistry::with_catalog().context("Built-in catalog failed validation")?;

    let extra = config.workflows.load_definitions()?;
    if !extra.is_empty() {
        tracing::info!("📥 Registering {} workflow definitions from file", extra.len());
    }
    for (kind, definition) in extra {
        registry
            .register(kind.clone(), definition)
            .with_context(|| format!("Failed to register workflow {}", kind))?;
    }

    let gateway: Arc<dyn PersistenceGateway> = if config.database.is_memory() {
        tracing::warn!("🧪 Using in-memory request store; requests are lost on restart");
        Arc::new(InMemoryGateway::new())
    } else {
        tracing::info!("🗄️ Connecting to request store at {}", config.database.url);
        Arc::new(SqliteGateway::connect(&config.database.url).await?)
    };

    tracing::info!("🚀 Initializing workflow engine");
    let engine = WorkflowEngine::new(Arc::new(registry), gateway);

    let app = build_router(engine);
    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// HTTP router for an already constructed engine
pub fn build_router(engine: WorkflowEngine) -> Router {
    let app_state = AppState { engine };

    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Workflow definition routes
        .merge(create_workflow_routes().with_state(app_state.clone()))
        // Service request routes
        .merge(create_request_routes().with_state(app_state))
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting servflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
