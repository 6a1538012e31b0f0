/// Workflow definition registry using ArcSwap
///
/// Definitions are registered once at startup and read lock-free afterwards.
/// Each registration swaps in a new map, so readers always see a complete,
/// validated snapshot.

use crate::error::{EngineError, EngineResult};
use crate::workflow::resolver::assignee;
use crate::workflow::types::{ServiceKind, WorkflowDefinition};
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// Lock-free registry of workflow definitions keyed by service kind
#[derive(Debug)]
pub struct WorkflowRegistry {
    /// Atomic pointer to the current definition map
    definitions: ArcSwap<HashMap<ServiceKind, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            definitions: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Registry preloaded with the built-in service catalog
    pub fn with_catalog() -> EngineResult<Self> {
        let registry = Self::new();
        for (kind, definition) in crate::workflow::catalog::builtin_definitions() {
            registry.register(kind, definition)?;
        }
        Ok(registry)
    }

    /// Validate and register a definition
    ///
    /// Fails with `InvalidDefinition` for malformed definitions and for kinds
    /// that are already registered.
    pub fn register(&self, kind: ServiceKind, definition: WorkflowDefinition) -> EngineResult<()> {
        validate_definition(&kind, &definition)?;

        // Readers never observe a half-built map: clone, insert, swap
        let current = self.definitions.load();
        if current.contains_key(&kind) {
            return Err(EngineError::InvalidDefinition {
                kind,
                reason: "service kind is already registered".to_string(),
            });
        }
        let mut next = (**current).clone();
        next.insert(kind.clone(), Arc::new(definition));
        self.definitions.store(Arc::new(next));

        tracing::info!("📋 Registered workflow definition: {}", kind);
        Ok(())
    }

    /// Get the definition for a service kind (lock-free read)
    pub fn lookup(&self, kind: &ServiceKind) -> EngineResult<Arc<WorkflowDefinition>> {
        self.definitions
            .load()
            .get(kind)
            .cloned()
            .ok_or_else(|| EngineError::UnknownServiceKind(kind.clone()))
    }

    /// All registered definitions, sorted by service kind
    pub fn list(&self) -> Vec<(ServiceKind, Arc<WorkflowDefinition>)> {
        let mut entries: Vec<_> = self
            .definitions
            .load()
            .iter()
            .map(|(kind, def)| (kind.clone(), Arc::clone(def)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.definitions.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural checks applied before a definition enters the registry
fn validate_definition(kind: &ServiceKind, definition: &WorkflowDefinition) -> EngineResult<()> {
    let invalid = |reason: String| EngineError::InvalidDefinition {
        kind: kind.clone(),
        reason,
    };

    if definition.total_stages < 1 {
        return Err(invalid("workflow must have at least one stage".to_string()));
    }
    if definition.stage_names.len() != definition.total_stages as usize {
        return Err(invalid(format!(
            "{} stage names for {} stages",
            definition.stage_names.len(),
            definition.total_stages
        )));
    }
    if let Some(stage) = definition
        .assignments
        .keys()
        .chain(definition.required_fields.keys())
        .find(|stage| !definition.contains_stage(**stage))
    {
        return Err(invalid(format!("stage {} is out of range", stage)));
    }
    for stage in 1..=definition.total_stages {
        assignee(definition, stage)
            .map_err(|_| invalid(format!("stage {} has no assignee and no default rule", stage)))?;
    }

    Ok(())
}
