/// Stage assignment resolution
///
/// Pure lookup of the role that owns a stage. Stages outside the definition
/// are an error, never a fallback.

use crate::error::{EngineError, EngineResult};
use crate::workflow::types::{Role, StageAssignment, WorkflowDefinition};

/// Resolve the role responsible for `stage` under `definition`
///
/// Explicit assignments win; everything else goes through the definition's
/// `DefaultAssignment`. Registered definitions are validated so that every
/// in-range stage resolves.
pub fn assignee(definition: &WorkflowDefinition, stage: u32) -> EngineResult<Role> {
    if !definition.contains_stage(stage) {
        return Err(EngineError::UnknownStage {
            stage,
            total_stages: definition.total_stages,
        });
    }

    match definition.assignment_of(stage) {
        StageAssignment::Explicit(role) => Ok(role.clone()),
        StageAssignment::DefaultRule => definition
            .default_assignment
            .as_ref()
            .map(|rule| rule.role_for(stage).clone())
            .ok_or_else(|| {
                // Only reachable for definitions that bypassed the registry
                EngineError::UnknownStage {
                    stage,
                    total_stages: definition.total_stages,
                }
            }),
    }
}
