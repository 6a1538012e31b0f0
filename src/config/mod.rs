/// Configuration management for the servflow engine
///
/// Handles server configuration, the request database and optional extra
/// workflow definitions.

use crate::workflow::types::{ServiceKind, WorkflowDefinition};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Workflow definition configuration
    pub workflows: WorkflowsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Service request storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL (e.g. "sqlite://data/servflow.db"), or "memory" for the
    /// in-process gateway
    pub url: String,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }
}

/// Extra workflow definitions registered after the built-in catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowsConfig {
    /// Path to a JSON array of `{ "service_kind": ..., "definition": ... }`
    pub definitions_path: Option<String>,
}

/// One entry of the definitions file
#[derive(Debug, Clone, Deserialize)]
struct DefinitionEntry {
    service_kind: ServiceKind,
    definition: WorkflowDefinition,
}

impl WorkflowsConfig {
    /// Read the configured definitions file, if any
    pub fn load_definitions(&self) -> Result<Vec<(ServiceKind, WorkflowDefinition)>> {
        let Some(path) = &self.definitions_path else {
            return Ok(Vec::new());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow definitions from {}", path))?;
        let entries: Vec<DefinitionEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid workflow definitions file {}", path))?;

        Ok(entries
            .into_iter()
            .map(|entry| (entry.service_kind, entry.definition))
            .collect())
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SERVFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SERVFLOW_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            database: DatabaseConfig {
                url: std::env::var("SERVFLOW_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/servflow.db".to_string()),
            },
            workflows: WorkflowsConfig {
                definitions_path: std::env::var("SERVFLOW_DEFINITIONS").ok(),
            },
        }
    }
}
