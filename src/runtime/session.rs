/// Workflow session: the live controller for one service request
///
/// A session is a projection of the last record the store confirmed. It is
/// only ever replaced by what a successful gateway write returns, so a failed
/// write leaves it exactly where it was.

use crate::error::{EngineError, EngineResult};
use crate::request::gateway::{GatewayError, PersistenceGateway};
use crate::request::types::{RequestPatch, RequestStatus, ServiceRequest, StageRecord};
use crate::runtime::aggregator::CompletionAggregator;
use crate::workflow::resolver::assignee;
use crate::workflow::types::{Role, WorkflowDefinition};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Whether the session may advance the workflow or only observe it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Caller owns the current stage and may complete it
    Active,
    /// Spectator view: stage data can be read, nothing can be submitted
    ReadOnly,
}

impl ViewMode {
    /// Mode a caller actually gets for a request
    ///
    /// Only the role assigned to the current stage of an in-progress request
    /// gets an active session, and only when it asked for one.
    pub fn resolve(request: &ServiceRequest, actor: &Role, requested: ViewMode) -> ViewMode {
        match requested {
            ViewMode::Active
                if request.status == RequestStatus::InProgress
                    && request.current_assigned_to.as_ref() == Some(actor) =>
            {
                ViewMode::Active
            }
            _ => ViewMode::ReadOnly,
        }
    }
}

pub struct WorkflowSession {
    request: ServiceRequest,
    definition: Arc<WorkflowDefinition>,
    actor: Role,
    requested_mode: ViewMode,
    mode: ViewMode,
    gateway: Arc<dyn PersistenceGateway>,
}

impl fmt::Debug for WorkflowSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowSession")
            .field("request_id", &self.request.id)
            .field("status", &self.request.status)
            .field("current_stage", &self.request.current_stage)
            .field("actor", &self.actor)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl WorkflowSession {
    /// Reconstruct a session from a persisted request
    ///
    /// The first active open of a request that nobody has started moves it to
    /// `InProgress`, records `actor` as the starter and hands stage 1 to its
    /// assignee, persisting before the session is returned. Every later open
    /// is a pure read of the stored record.
    pub async fn open(
        gateway: Arc<dyn PersistenceGateway>,
        definition: Arc<WorkflowDefinition>,
        mut request: ServiceRequest,
        actor: Role,
        requested_mode: ViewMode,
    ) -> EngineResult<Self> {
        if request.started_by.is_none()
            && request.status == RequestStatus::Pending
            && requested_mode == ViewMode::Active
        {
            request = Self::start(gateway.as_ref(), &definition, request, &actor).await?;
        }

        let mode = ViewMode::resolve(&request, &actor, requested_mode);
        tracing::debug!(
            "📂 Opened session for {} as {} ({:?}, stage {:?})",
            request.id,
            actor,
            mode,
            request.current_stage
        );

        Ok(Self {
            request,
            definition,
            actor,
            requested_mode,
            mode,
            gateway,
        })
    }

    /// Pending -> InProgress transition with stage 1 assignment
    async fn start(
        gateway: &dyn PersistenceGateway,
        definition: &WorkflowDefinition,
        request: ServiceRequest,
        actor: &Role,
    ) -> EngineResult<ServiceRequest> {
        let first_assignee = assignee(definition, 1)?;
        let now = Utc::now();

        let mut patch = RequestPatch::expecting(request.version);
        patch.status = Some(RequestStatus::InProgress);
        patch.current_stage = Some(1);
        patch.current_assigned_to = Some(first_assignee.clone());
        patch.started_by = Some(actor.clone());
        patch.stage_records.insert(1, StageRecord::started(now));

        match gateway.write(&request.id, patch).await {
            Ok(started) => {
                tracing::info!(
                    "🚀 Started workflow {} ({}) by {}, stage 1 assigned to {}",
                    started.id,
                    started.service_kind,
                    actor,
                    first_assignee
                );
                Ok(started)
            }
            Err(GatewayError::ConcurrencyConflict { .. }) => {
                // Someone else started it between our read and write
                tracing::debug!("🔁 Request {} was started concurrently, reloading", request.id);
                Ok(gateway.read(&request.id).await?)
            }
            Err(e) => {
                tracing::error!("❌ Failed to start workflow {}: {}", request.id, e);
                Err(e.into())
            }
        }
    }

    /// Submit the payload for the current stage
    ///
    /// Non-final stages are recorded and the workflow is handed to the next
    /// stage's assignee in one write. The final stage is delegated to the
    /// `CompletionAggregator`. On any error the session is unchanged.
    pub async fn complete_stage(&mut self, payload: Value) -> EngineResult<&ServiceRequest> {
        let stage = self.guard_submission(&payload)?;

        if stage == self.definition.total_stages {
            CompletionAggregator::finalize(self, payload).await?;
            return Ok(&self.request);
        }

        let next = stage + 1;
        let next_assignee = assignee(&self.definition, next)?;
        let now = Utc::now();

        let mut patch = RequestPatch::expecting(self.request.version);
        patch
            .stage_records
            .insert(stage, self.completed_record(stage, payload, now));
        patch.stage_records.insert(next, StageRecord::started(now));
        patch.current_stage = Some(next);
        patch.current_assigned_to = Some(next_assignee.clone());

        self.commit(patch).await?;
        tracing::info!(
            "➡️ {} completed stage {}/{} of {}, handed to {}",
            self.actor,
            stage,
            self.definition.total_stages,
            self.request.id,
            next_assignee
        );

        Ok(&self.request)
    }

    /// Checks every submission must pass before anything is written
    ///
    /// In order: `AlreadyCompleted`, `NotAssigned`, `ReadOnlySession`, then the
    /// payload contract of the current stage. Returns the current stage.
    pub(crate) fn guard_submission(&self, payload: &Value) -> EngineResult<u32> {
        if self.request.is_completed() {
            return Err(EngineError::AlreadyCompleted(self.request.id.clone()));
        }
        let (stage, assigned) = match (self.request.current_stage, &self.request.current_assigned_to) {
            (Some(stage), Some(assigned)) => (stage, assigned),
            _ => return Err(EngineError::ReadOnlySession),
        };
        if *assigned != self.actor {
            tracing::warn!(
                "⛔ {} tried to complete stage {} of {} assigned to {}",
                self.actor,
                stage,
                self.request.id,
                assigned
            );
            return Err(EngineError::NotAssigned {
                actor: self.actor.clone(),
                assigned: assigned.clone(),
            });
        }
        if self.mode == ViewMode::ReadOnly {
            return Err(EngineError::ReadOnlySession);
        }
        validate_payload(&self.definition, stage, payload)?;

        Ok(stage)
    }

    /// Persisted record of an already reached stage (pure read)
    pub fn stage_record(&self, stage: u32) -> EngineResult<Option<&StageRecord>> {
        if !self.definition.contains_stage(stage) {
            return Err(EngineError::UnknownStage {
                stage,
                total_stages: self.definition.total_stages,
            });
        }
        let reached = self.reached_stage();
        if stage > reached {
            return Err(EngineError::StageNotReached {
                stage,
                current: reached,
            });
        }
        Ok(self.request.stage_records.get(&stage))
    }

    /// Payload submitted for stage `stage`, for display only
    ///
    /// Returns `None` for the current stage while it is still open. Never
    /// touches `current_stage` or any stage record.
    pub fn view_previous_stage(&self, stage: u32) -> EngineResult<Option<&Value>> {
        Ok(self
            .stage_record(stage)?
            .and_then(|record| record.payload.as_ref()))
    }

    /// Payloads of every completed stage, keyed by stage number
    pub fn accumulated_payloads(&self) -> BTreeMap<u32, &Value> {
        self.request.completed_payloads()
    }

    pub fn current_stage_name(&self) -> Option<&str> {
        self.request
            .current_stage
            .and_then(|stage| self.definition.stage_name(stage))
    }

    pub fn request(&self) -> &ServiceRequest {
        &self.request
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub fn actor(&self) -> &Role {
        &self.actor
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Highest stage whose data may be shown
    fn reached_stage(&self) -> u32 {
        if self.request.is_completed() {
            self.definition.total_stages
        } else {
            self.request.current_stage.unwrap_or(0)
        }
    }

    /// Stage record marking `stage` as completed by this session's actor
    pub(crate) fn completed_record(
        &self,
        stage: u32,
        payload: Value,
        now: chrono::DateTime<Utc>,
    ) -> StageRecord {
        let started_at = self
            .request
            .stage_records
            .get(&stage)
            .and_then(|record| record.started_at)
            .unwrap_or(now);
        StageRecord {
            started_at: Some(started_at),
            completed_at: Some(now),
            completed_by: Some(self.actor.clone()),
            payload: Some(payload),
        }
    }

    /// Write a patch and adopt the stored record on success
    pub(crate) async fn commit(&mut self, patch: RequestPatch) -> EngineResult<&ServiceRequest> {
        let updated = self
            .gateway
            .write(&self.request.id, patch)
            .await
            .map_err(|e| {
                match &e {
                    GatewayError::ConcurrencyConflict { .. } | GatewayError::AlreadyCompleted(_) => {
                        tracing::warn!("⚠️ Write to {} refused: {}", self.request.id, e)
                    }
                    _ => tracing::error!("❌ Failed to persist {}: {}", self.request.id, e),
                }
                EngineError::from(e)
            })?;

        self.request = updated;
        self.mode = ViewMode::resolve(&self.request, &self.actor, self.requested_mode);
        Ok(&self.request)
    }
}

/// Minimal-field contract: a non-empty JSON object carrying every required field
fn validate_payload(definition: &WorkflowDefinition, stage: u32, payload: &Value) -> EngineResult<()> {
    let incomplete = |reason: String| EngineError::IncompleteStagePayload { stage, reason };

    let object = payload
        .as_object()
        .ok_or_else(|| incomplete("payload must be a JSON object".to_string()))?;
    if object.is_empty() {
        return Err(incomplete("payload is empty".to_string()));
    }

    let missing: Vec<&str> = definition
        .required_fields_of(stage)
        .iter()
        .filter(|field| object.get(field.as_str()).map_or(true, Value::is_null))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(incomplete(format!("missing required fields: {}", missing.join(", "))));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::memory::InMemoryGateway;
    use serde_json::json;

    fn three_stage() -> Arc<WorkflowDefinition> {
        Arc::new(
            WorkflowDefinition::new("Assessment", vec!["Intake", "Review", "Report"])
                .assign(1, "role_a")
                .assign(2, "role_b")
                .assign(3, "role_a")
                .require(2, "risk"),
        )
    }

    async fn pending(gateway: &InMemoryGateway) -> ServiceRequest {
        let request = ServiceRequest::pending("assessment".into(), Some("Acme".into()), json!({}));
        gateway.create(request.clone()).await.unwrap();
        request
    }

    async fn open_as(
        gateway: &Arc<InMemoryGateway>,
        id: &str,
        role: &str,
        mode: ViewMode,
    ) -> WorkflowSession {
        let request = gateway.read(id).await.unwrap();
        WorkflowSession::open(gateway.clone(), three_stage(), request, Role::new(role), mode)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_active_open_starts_workflow() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;

        let session = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;

        assert_eq!(session.mode(), ViewMode::Active);
        let stored = gateway.read(&request.id).await.unwrap();
        assert_eq!(stored.status, RequestStatus::InProgress);
        assert_eq!(stored.current_stage, Some(1));
        assert_eq!(stored.current_assigned_to, Some(Role::new("role_a")));
        assert_eq!(stored.started_by, Some(Role::new("role_a")));
        assert!(stored.stage_records[&1].started_at.is_some());
        assert_eq!(session.current_stage_name(), Some("Intake"));
    }

    #[tokio::test]
    async fn test_read_only_open_does_not_start() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;

        let mut session = open_as(&gateway, &request.id, "role_a", ViewMode::ReadOnly).await;

        assert_eq!(session.mode(), ViewMode::ReadOnly);
        assert_eq!(gateway.read(&request.id).await.unwrap(), request);
        assert_eq!(
            session.complete_stage(json!({"notes": "x"})).await.unwrap_err(),
            EngineError::ReadOnlySession
        );
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;

        let first = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;
        let second = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;

        assert_eq!(first.request(), second.request());
        assert_eq!(first.mode(), second.mode());
        assert_eq!(second.request().version, 1);
    }

    #[tokio::test]
    async fn test_spectator_gets_read_only_mode() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;

        let spectator = open_as(&gateway, &request.id, "role_b", ViewMode::Active).await;
        assert_eq!(spectator.mode(), ViewMode::ReadOnly);
    }

    #[tokio::test]
    async fn test_complete_stage_advances_and_hands_off() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        let mut session = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;

        let updated = session.complete_stage(json!({"notes": "x"})).await.unwrap();

        assert_eq!(updated.current_stage, Some(2));
        assert_eq!(updated.current_assigned_to, Some(Role::new("role_b")));
        assert_eq!(updated.stage_records[&1].payload, Some(json!({"notes": "x"})));
        assert_eq!(updated.stage_records[&1].completed_by, Some(Role::new("role_a")));
        assert!(updated.stage_records[&2].started_at.is_some());
        // Handoff demotes the previous owner to spectator
        assert_eq!(session.mode(), ViewMode::ReadOnly);
        assert_eq!(gateway.read(&request.id).await.unwrap(), *session.request());
    }

    #[tokio::test]
    async fn test_not_assigned_leaves_record_unchanged() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;
        let before = gateway.read(&request.id).await.unwrap();

        let mut intruder = open_as(&gateway, &request.id, "role_b", ViewMode::Active).await;
        let err = intruder.complete_stage(json!({"notes": "x"})).await.unwrap_err();

        assert_eq!(
            err,
            EngineError::NotAssigned {
                actor: Role::new("role_b"),
                assigned: Role::new("role_a"),
            }
        );
        assert_eq!(gateway.read(&request.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_incomplete_payloads_are_rejected() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        let mut a = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;

        assert!(matches!(
            a.complete_stage(json!({})).await,
            Err(EngineError::IncompleteStagePayload { stage: 1, .. })
        ));
        assert!(matches!(
            a.complete_stage(json!("done")).await,
            Err(EngineError::IncompleteStagePayload { stage: 1, .. })
        ));
        a.complete_stage(json!({"notes": "x"})).await.unwrap();

        let mut b = open_as(&gateway, &request.id, "role_b", ViewMode::Active).await;
        let err = b.complete_stage(json!({"risk": null})).await.unwrap_err();
        assert!(err.to_string().contains("risk"));
        assert_eq!(b.request().current_stage, Some(2));
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_session_unadvanced() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        let mut session = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;
        let before = session.request().clone();

        gateway.set_fail_writes(true);
        assert!(matches!(
            session.complete_stage(json!({"notes": "x"})).await,
            Err(EngineError::PersistenceFailure(_))
        ));
        assert_eq!(session.request(), &before);

        // Retrying the same call succeeds once the store recovers
        gateway.set_fail_writes(false);
        let updated = session.complete_stage(json!({"notes": "x"})).await.unwrap();
        assert_eq!(updated.current_stage, Some(2));
    }

    #[tokio::test]
    async fn test_stale_session_gets_concurrency_conflict() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        let mut tab_one = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;
        let mut tab_two = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;

        tab_one.complete_stage(json!({"notes": "first"})).await.unwrap();
        let err = tab_two.complete_stage(json!({"notes": "second"})).await.unwrap_err();

        assert_eq!(
            err,
            EngineError::ConcurrencyConflict {
                expected: 1,
                actual: 2
            }
        );
        let stored = gateway.read(&request.id).await.unwrap();
        assert_eq!(stored.stage_records[&1].payload, Some(json!({"notes": "first"})));
        assert_eq!(stored.current_stage, Some(2));
    }

    #[tokio::test]
    async fn test_view_previous_stage_is_pure() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        let mut a = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;
        a.complete_stage(json!({"notes": "x"})).await.unwrap();

        let b = open_as(&gateway, &request.id, "role_b", ViewMode::Active).await;
        let before = b.request().clone();

        assert_eq!(b.view_previous_stage(1).unwrap(), Some(&json!({"notes": "x"})));
        assert_eq!(b.view_previous_stage(2).unwrap(), None);
        assert_eq!(
            b.view_previous_stage(3),
            Err(EngineError::StageNotReached {
                stage: 3,
                current: 2
            })
        );
        assert!(matches!(
            b.view_previous_stage(9),
            Err(EngineError::UnknownStage { stage: 9, .. })
        ));
        assert_eq!(b.request(), &before);
        assert_eq!(gateway.read(&request.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_reopen_resumes_from_last_write() {
        let gateway = Arc::new(InMemoryGateway::new());
        let request = pending(&gateway).await;
        let mut a = open_as(&gateway, &request.id, "role_a", ViewMode::Active).await;
        let after_write = a.complete_stage(json!({"notes": "x"})).await.unwrap().clone();
        drop(a);

        let resumed = open_as(&gateway, &request.id, "role_b", ViewMode::Active).await;
        assert_eq!(resumed.request().current_stage, after_write.current_stage);
        assert_eq!(
            resumed.request().current_assigned_to,
            after_write.current_assigned_to
        );
        assert_eq!(resumed.mode(), ViewMode::Active);
        assert_eq!(resumed.accumulated_payloads().len(), 1);
    }
}
