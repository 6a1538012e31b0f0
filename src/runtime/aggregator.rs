/// Completion aggregation
///
/// Folds every stage payload into one `CompletionData` and flips the request to
/// `Completed` in a single write.

use crate::error::{EngineError, EngineResult};
use crate::request::types::{CompletionData, RequestPatch, RequestStatus, ServiceRequest};
use crate::runtime::session::WorkflowSession;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;

pub struct CompletionAggregator;

impl CompletionAggregator {
    /// Finalize the request behind `session` with the last stage's payload
    ///
    /// Runs the same caller, mode and payload checks as
    /// `WorkflowSession::complete_stage`, so only the assignee of the final
    /// stage on an active session can finalize. Duplicate submissions fail with
    /// `AlreadyCompleted`, either from the session's own record or from the
    /// store when the session is stale.
    pub async fn finalize(session: &mut WorkflowSession, final_payload: Value) -> EngineResult<ServiceRequest> {
        let current = session.guard_submission(&final_payload)?;
        let total_stages = session.definition().total_stages;
        if current != total_stages {
            return Err(EngineError::NotFinalStage {
                current,
                total_stages,
            });
        }

        let request = session.request();
        let mut stages: BTreeMap<u32, Value> = request
            .completed_payloads()
            .into_iter()
            .map(|(stage, payload)| (stage, payload.clone()))
            .collect();
        stages.insert(total_stages, final_payload.clone());
        if let Some(missing) = (1..=total_stages).find(|stage| !stages.contains_key(stage)) {
            return Err(EngineError::IncompleteStagePayload {
                stage: missing,
                reason: "stage has no recorded payload".to_string(),
            });
        }

        let now = Utc::now();
        let completed_by = session.actor().clone();
        let mut patch = RequestPatch::expecting(request.version);
        patch.stage_records.insert(
            total_stages,
            session.completed_record(total_stages, final_payload, now),
        );
        patch.status = Some(RequestStatus::Completed);
        patch.completion_data = Some(CompletionData {
            stages,
            completed_at: now,
            completed_by: completed_by.clone(),
        });
        patch.completed_at = Some(now);

        let completed = session.commit(patch).await?.clone();
        tracing::info!(
            "🎉 Service request {} ({}) completed by {} after {} stages",
            completed.id,
            completed.service_kind,
            completed_by,
            total_stages
        );

        Ok(completed)
    }
}
