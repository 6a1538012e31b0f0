/// Servflow: stage-based service workflow engine
///
/// Drives client service requests (certificates, classifications, sourcing,
/// market studies) through ordered stages owned by specialist roles, with
/// optimistic-concurrency persistence and a final aggregated result.

// Core configuration and setup
pub mod config;

// Engine error types
pub mod error;

// Workflow definitions, assignment resolution and the registry
pub mod workflow;

// Service request records and persistence gateways
pub mod request;

// Sessions, stage transitions and completion aggregation
pub mod runtime;

// HTTP API layer - REST endpoints for definitions and service requests
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{EngineError, EngineResult};
pub use request::{PersistenceGateway, RequestStatus, ServiceRequest};
pub use runtime::{ViewMode, WorkflowEngine, WorkflowSession};
pub use server::start_server;
pub use workflow::{Role, ServiceKind, WorkflowDefinition, WorkflowRegistry};
