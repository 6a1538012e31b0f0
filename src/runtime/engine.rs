/// Workflow engine facade
///
/// Ties the definition registry to a persistence gateway. Every entry point
/// reconstructs state from the store; the engine itself holds no per-request
/// state between calls.

use crate::error::{EngineError, EngineResult};
use crate::request::gateway::{PersistenceGateway, RequestFilter};
use crate::request::types::{RequestStatus, ServiceRequest};
use crate::runtime::session::{ViewMode, WorkflowSession};
use crate::workflow::registry::WorkflowRegistry;
use crate::workflow::types::{Role, ServiceKind};
use serde_json::Value;
use std::sync::Arc;

/// Entry point for intake, session opening and stage submission
#[derive(Clone)]
pub struct WorkflowEngine {
    registry: Arc<WorkflowRegistry>,
    gateway: Arc<dyn PersistenceGateway>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<WorkflowRegistry>, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { registry, gateway }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Create a pending request for a registered service kind
    pub async fn intake(
        &self,
        service_kind: ServiceKind,
        client_company: Option<String>,
        details: Value,
    ) -> EngineResult<ServiceRequest> {
        self.registry.lookup(&service_kind)?;

        let request = ServiceRequest::pending(service_kind, client_company, details);
        self.gateway.create(request.clone()).await?;
        tracing::info!("📥 New {} request {}", request.service_kind, request.id);

        Ok(request)
    }

    pub async fn get(&self, id: &str) -> EngineResult<ServiceRequest> {
        Ok(self.gateway.read(id).await?)
    }

    pub async fn list(&self, filter: &RequestFilter) -> EngineResult<Vec<ServiceRequest>> {
        Ok(self.gateway.list(filter).await?)
    }

    /// Open a session on a stored request
    ///
    /// Fails with `UnknownServiceKind` before any session exists if the
    /// request's kind is not registered.
    pub async fn open(&self, id: &str, actor: Role, mode: ViewMode) -> EngineResult<WorkflowSession> {
        let request = self.gateway.read(id).await?;
        let definition = self.registry.lookup(&request.service_kind)?;
        WorkflowSession::open(Arc::clone(&self.gateway), definition, request, actor, mode).await
    }

    /// Complete `stage` of a request on behalf of `actor`
    ///
    /// The stage number acts as an "expected current stage" precondition for
    /// callers that do not hold a session across requests.
    pub async fn submit_stage(
        &self,
        id: &str,
        actor: Role,
        stage: u32,
        payload: Value,
    ) -> EngineResult<WorkflowSession> {
        let request = self.gateway.read(id).await?;
        let definition = self.registry.lookup(&request.service_kind)?;

        match (request.status, request.current_stage) {
            (RequestStatus::Completed, _) => return Err(EngineError::AlreadyCompleted(request.id)),
            (RequestStatus::InProgress, Some(current)) if current == stage => {}
            (_, current) => {
                return Err(EngineError::StageMismatch {
                    submitted: stage,
                    current: current.unwrap_or(0),
                })
            }
        }

        let mut session = WorkflowSession::open(
            Arc::clone(&self.gateway),
            definition,
            request,
            actor,
            ViewMode::Active,
        )
        .await?;
        session.complete_stage(payload).await?;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::memory::InMemoryGateway;
    use serde_json::json;

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(
            Arc::new(WorkflowRegistry::with_catalog().unwrap()),
            Arc::new(InMemoryGateway::new()),
        )
    }

    #[tokio::test]
    async fn test_intake_rejects_unknown_kind() {
        let engine = engine();
        assert_eq!(
            engine.intake("tariff_lookup".into(), None, json!({})).await,
            Err(EngineError::UnknownServiceKind("tariff_lookup".into()))
        );
    }

    #[tokio::test]
    async fn test_open_unregistered_kind_creates_no_session() {
        let gateway = Arc::new(InMemoryGateway::new());
        let orphan = ServiceRequest::pending("retired_service".into(), None, json!({}));
        gateway.create(orphan.clone()).await.unwrap();
        let engine = WorkflowEngine::new(Arc::new(WorkflowRegistry::with_catalog().unwrap()), gateway.clone());

        let err = engine
            .open(&orphan.id, Role::new("trade_specialist"), ViewMode::Active)
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::UnknownServiceKind("retired_service".into()));
        assert_eq!(gateway.read(&orphan.id).await.unwrap(), orphan);
    }

    #[tokio::test]
    async fn test_submit_stage_requires_current_stage() {
        let engine = engine();
        let request = engine
            .intake("market_entry".into(), Some("Acme".into()), json!({}))
            .await
            .unwrap();
        let specialist = Role::new("trade_specialist");

        // Not started yet
        assert_eq!(
            engine
                .submit_stage(&request.id, specialist.clone(), 1, json!({"goalsCollected": true}))
                .await
                .unwrap_err(),
            EngineError::StageMismatch {
                submitted: 1,
                current: 0
            }
        );

        engine
            .open(&request.id, specialist.clone(), ViewMode::Active)
            .await
            .unwrap();
        let session = engine
            .submit_stage(&request.id, specialist.clone(), 1, json!({"goalsCollected": true}))
            .await
            .unwrap();
        assert_eq!(session.request().current_stage, Some(2));

        // Replay of stage 1 is refused without touching the record
        assert_eq!(
            engine
                .submit_stage(&request.id, specialist, 1, json!({"goalsCollected": true}))
                .await
                .unwrap_err(),
            EngineError::StageMismatch {
                submitted: 1,
                current: 2
            }
        );
    }

    #[tokio::test]
    async fn test_list_by_kind() {
        let engine = engine();
        engine.intake("market_entry".into(), None, json!({})).await.unwrap();
        engine.intake("crisis_response".into(), None, json!({})).await.unwrap();

        let filter = RequestFilter {
            service_kind: Some("crisis_response".into()),
            status: None,
        };
        assert_eq!(engine.list(&filter).await.unwrap().len(), 1);
    }
}
