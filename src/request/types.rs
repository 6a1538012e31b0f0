/// Service request record and partial-update types
///
/// `ServiceRequest` is the durable unit of work. Stores never mutate it field by
/// field; they apply a whole `RequestPatch` through `ServiceRequest::apply`,
/// which enforces the record's invariants before anything changes.

use crate::request::gateway::GatewayError;
use crate::workflow::types::{Role, ServiceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created at intake, nobody has opened the workflow yet
    Pending,
    /// Workflow started, `current_stage` is meaningful
    InProgress,
    /// Final stage finalized, `completion_data` present
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit entry for one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Role>,
    pub payload: Option<Value>,
}

impl StageRecord {
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(at),
            ..Self::default()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Aggregate of every stage payload, written once on completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionData {
    /// Stage number -> payload submitted for that stage
    pub stages: BTreeMap<u32, Value>,
    pub completed_at: DateTime<Utc>,
    pub completed_by: Role,
}

/// Durable record of one service being fulfilled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: String,
    pub service_kind: ServiceKind,
    pub status: RequestStatus,
    pub current_stage: Option<u32>,
    pub current_assigned_to: Option<Role>,
    pub started_by: Option<Role>,
    #[serde(default)]
    pub stage_records: BTreeMap<u32, StageRecord>,
    pub completion_data: Option<CompletionData>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Incremented by the store on every successful write
    pub version: u64,
    pub client_company: Option<String>,
    /// Intake data shown to the stage renderers
    #[serde(default)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    /// New pending request as produced by intake
    pub fn pending(service_kind: ServiceKind, client_company: Option<String>, details: Value) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            service_kind,
            status: RequestStatus::Pending,
            current_stage: None,
            current_assigned_to: None,
            started_by: None,
            stage_records: BTreeMap::new(),
            completion_data: None,
            completed_at: None,
            version: 0,
            client_company,
            details,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RequestStatus::Completed
    }

    /// Payloads of every completed stage, in stage order
    pub fn completed_payloads(&self) -> BTreeMap<u32, &Value> {
        self.stage_records
            .iter()
            .filter(|(_, record)| record.is_completed())
            .filter_map(|(stage, record)| record.payload.as_ref().map(|p| (*stage, p)))
            .collect()
    }

    /// Apply a partial update atomically
    ///
    /// Either every field in the patch is applied and `version` is bumped, or
    /// the record is left untouched and an error is returned.
    pub fn apply(&mut self, patch: RequestPatch, now: DateTime<Utc>) -> Result<(), GatewayError> {
        if self.is_completed() {
            return Err(GatewayError::AlreadyCompleted(self.id.clone()));
        }
        if patch.expected_version != self.version {
            return Err(GatewayError::ConcurrencyConflict {
                expected: patch.expected_version,
                actual: self.version,
            });
        }
        if let Some(status) = patch.status {
            if status < self.status {
                return Err(GatewayError::Rejected(format!(
                    "status cannot move from {} to {}",
                    self.status, status
                )));
            }
        }
        let completing = patch.status == Some(RequestStatus::Completed);
        if patch.completion_data.is_some() != completing {
            return Err(GatewayError::Rejected(
                "completion data must be written together with the completed status".to_string(),
            ));
        }
        if completing && self.status != RequestStatus::InProgress {
            return Err(GatewayError::Rejected(format!(
                "only an in-progress request can complete (status: {})",
                self.status
            )));
        }
        if let (Some(existing), Some(requested)) = (&self.started_by, &patch.started_by) {
            if existing != requested {
                return Err(GatewayError::Rejected(format!(
                    "request already started by {}",
                    existing
                )));
            }
        }
        if let Some(stage) = patch
            .stage_records
            .keys()
            .find(|stage| self.stage_records.get(stage).is_some_and(StageRecord::is_completed))
        {
            return Err(GatewayError::ImmutableStage(*stage));
        }

        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(stage) = patch.current_stage {
            self.current_stage = Some(stage);
        }
        if let Some(role) = patch.current_assigned_to {
            self.current_assigned_to = Some(role);
        }
        if let Some(role) = patch.started_by {
            self.started_by = Some(role);
        }
        self.stage_records.extend(patch.stage_records);
        if let Some(data) = patch.completion_data {
            self.completion_data = Some(data);
        }
        if let Some(at) = patch.completed_at {
            self.completed_at = Some(at);
        }
        self.version += 1;
        self.updated_at = now;

        Ok(())
    }
}

/// Partial update of a `ServiceRequest`
///
/// `expected_version` is the optimistic-concurrency precondition: the write is
/// refused unless the stored record still carries that version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPatch {
    pub expected_version: u64,
    pub status: Option<RequestStatus>,
    pub current_stage: Option<u32>,
    pub current_assigned_to: Option<Role>,
    pub started_by: Option<Role>,
    #[serde(default)]
    pub stage_records: BTreeMap<u32, StageRecord>,
    pub completion_data: Option<CompletionData>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RequestPatch {
    pub fn expecting(version: u64) -> Self {
        Self {
            expected_version: version,
            ..Self::default()
        }
    }
}
