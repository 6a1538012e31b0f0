/// Runtime Layer
///
/// Drives service requests through their stages:
/// - Workflow sessions reconstructed from the persisted record
/// - Role-gated stage completion with assignment handoff
/// - Completion aggregation and the final status flip

// Engine facade used by the HTTP layer
pub mod engine;

// Per-request session and stage transitions
pub mod session;

// Final-stage aggregation
pub mod aggregator;

pub use aggregator::CompletionAggregator;
pub use engine::WorkflowEngine;
pub use session::{ViewMode, WorkflowSession};
