/// Workflow definition types
///
/// A `WorkflowDefinition` describes one service kind: its ordered stages and
/// which role owns each of them. Definitions are plain serde structs so they can
/// be shipped in JSON as well as built in code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A party eligible to act on a stage (e.g. "trade_specialist")
///
/// Roles come from the caller's authentication context and are compared as
/// opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier of a service offering (e.g. "usmca_certificate")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceKind(String);

impl ServiceKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// How a single stage picks its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "role")]
pub enum StageAssignment {
    /// Stage is always owned by this role
    Explicit(Role),
    /// Stage owner comes from the definition's `DefaultAssignment`
    DefaultRule,
}

/// Default ownership rule for stages without an explicit role
///
/// Stage 1 goes to `primary`, even stages go to `secondary`, every other odd
/// stage goes back to `primary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAssignment {
    pub primary: Role,
    pub secondary: Role,
}

impl DefaultAssignment {
    pub fn role_for(&self, stage: u32) -> &Role {
        if stage == 1 {
            &self.primary
        } else if stage % 2 == 0 {
            &self.secondary
        } else {
            &self.primary
        }
    }
}

/// Static description of a service kind's stages
///
/// Stage numbers are 1-based. A stage missing from `assignments` behaves as
/// `StageAssignment::DefaultRule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Human-readable title (e.g. "USMCA Certificate Generation")
    pub title: String,
    /// Number of stages; must equal `stage_names.len()`
    pub total_stages: u32,
    /// Display name per stage, in order
    pub stage_names: Vec<String>,
    #[serde(default)]
    pub assignments: BTreeMap<u32, StageAssignment>,
    #[serde(default)]
    pub default_assignment: Option<DefaultAssignment>,
    /// Minimal payload fields each stage must supply
    #[serde(default)]
    pub required_fields: BTreeMap<u32, Vec<String>>,
}

impl WorkflowDefinition {
    /// Start a definition from a title and its ordered stage names
    pub fn new<S: Into<String>>(title: impl Into<String>, stage_names: Vec<S>) -> Self {
        let stage_names: Vec<String> = stage_names.into_iter().map(Into::into).collect();
        Self {
            title: title.into(),
            total_stages: stage_names.len() as u32,
            stage_names,
            assignments: BTreeMap::new(),
            default_assignment: None,
            required_fields: BTreeMap::new(),
        }
    }

    pub fn assign(mut self, stage: u32, role: impl Into<Role>) -> Self {
        self.assignments
            .insert(stage, StageAssignment::Explicit(role.into()));
        self
    }

    pub fn assign_all(mut self, role: impl Into<Role>) -> Self {
        let role = role.into();
        for stage in 1..=self.total_stages {
            self.assignments
                .insert(stage, StageAssignment::Explicit(role.clone()));
        }
        self
    }

    pub fn with_default(mut self, primary: impl Into<Role>, secondary: impl Into<Role>) -> Self {
        self.default_assignment = Some(DefaultAssignment {
            primary: primary.into(),
            secondary: secondary.into(),
        });
        self
    }

    pub fn require(mut self, stage: u32, field: impl Into<String>) -> Self {
        self.required_fields
            .entry(stage)
            .or_default()
            .push(field.into());
        self
    }

    /// Assignment for a stage, treating missing entries as the default rule
    pub fn assignment_of(&self, stage: u32) -> &StageAssignment {
        static DEFAULT_RULE: StageAssignment = StageAssignment::DefaultRule;
        self.assignments.get(&stage).unwrap_or(&DEFAULT_RULE)
    }

    pub fn stage_name(&self, stage: u32) -> Option<&str> {
        let index = usize::try_from(stage.checked_sub(1)?).ok()?;
        self.stage_names.get(index).map(String::as_str)
    }

    pub fn contains_stage(&self, stage: u32) -> bool {
        (1..=self.total_stages).contains(&stage)
    }

    pub fn required_fields_of(&self, stage: u32) -> &[String] {
        self.required_fields
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_assignment_rule() {
        let rule = DefaultAssignment {
            primary: Role::new("a"),
            secondary: Role::new("b"),
        };
        assert_eq!(rule.role_for(1).as_str(), "a");
        assert_eq!(rule.role_for(2).as_str(), "b");
        assert_eq!(rule.role_for(3).as_str(), "a");
        assert_eq!(rule.role_for(4).as_str(), "b");
    }

    #[test]
    fn test_builder_and_lookups() {
        let def = WorkflowDefinition::new("Review", vec!["Intake", "Check"])
            .assign(1, "a")
            .require(2, "checked");

        assert_eq!(def.total_stages, 2);
        assert_eq!(def.stage_name(1), Some("Intake"));
        assert_eq!(def.stage_name(0), None);
        assert_eq!(def.stage_name(3), None);
        assert_eq!(def.assignment_of(1), &StageAssignment::Explicit(Role::new("a")));
        assert_eq!(def.assignment_of(2), &StageAssignment::DefaultRule);
        assert_eq!(def.required_fields_of(2), ["checked".to_string()]);
        assert!(def.required_fields_of(1).is_empty());
    }

    #[test]
    fn test_definition_json_shape() {
        let json = serde_json::json!({
            "title": "Audit",
            "total_stages": 2,
            "stage_names": ["One", "Two"],
            "assignments": { "1": { "type": "explicit", "role": "a" }, "2": { "type": "default_rule" } },
            "default_assignment": { "primary": "a", "secondary": "b" }
        });
        let def: WorkflowDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.assignment_of(1), &StageAssignment::Explicit(Role::new("a")));
        assert_eq!(def.assignment_of(2), &StageAssignment::DefaultRule);
        assert!(def.required_fields.is_empty());
    }
}
