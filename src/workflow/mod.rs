/// Workflow Definition Layer
///
/// Static description of every service kind the engine can drive:
/// - Type definitions (WorkflowDefinition, Role, ServiceKind, StageAssignment)
/// - Stage assignment resolution with an explicit default rule
/// - Lock-free registry using ArcSwap
/// - Built-in service catalog

pub mod types;

pub mod resolver;

pub mod registry;

pub mod catalog;

pub use registry::WorkflowRegistry;
pub use resolver::assignee;
pub use types::{DefaultAssignment, Role, ServiceKind, StageAssignment, WorkflowDefinition};
