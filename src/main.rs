/// Servflow server entry point
///
/// Initializes configuration and starts the HTTP server with workflow
/// definition and service request endpoints.

use servflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow definitions at /api/workflows/*
/// - Service requests and stage operations at /api/requests/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004 and a SQLite request store)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
