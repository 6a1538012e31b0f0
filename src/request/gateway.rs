/// Persistence gateway trait definition

use async_trait::async_trait;
use serde::Deserialize;

use crate::request::types::{RequestPatch, RequestStatus, ServiceRequest};
use crate::workflow::types::ServiceKind;

/// Error type for gateway operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Service request not found
    #[error("service request not found: {0}")]
    NotFound(String),

    /// A request with this id already exists
    #[error("service request already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic concurrency check failed
    #[error("concurrency conflict: expected version {expected}, got {actual}")]
    ConcurrencyConflict { expected: u64, actual: u64 },

    /// Request is completed and accepts no further writes
    #[error("service request already completed: {0}")]
    AlreadyCompleted(String),

    /// Write would overwrite a completed stage
    #[error("stage {0} is already completed")]
    ImmutableStage(u32),

    /// Write would break a record invariant
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Filter for listing service requests
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub service_kind: Option<ServiceKind>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn matches(&self, request: &ServiceRequest) -> bool {
        self.service_kind
            .as_ref()
            .map_or(true, |kind| *kind == request.service_kind)
            && self.status.map_or(true, |status| status == request.status)
    }
}

/// Durable store for service requests
///
/// Implementations must apply each `write` atomically: a concurrent `read`
/// observes either none or all of a patch. Every write is guarded by the
/// patch's `expected_version`.
#[async_trait]
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Insert a freshly created request (intake)
    async fn create(&self, request: ServiceRequest) -> Result<(), GatewayError>;

    /// Load a request by id
    async fn read(&self, id: &str) -> Result<ServiceRequest, GatewayError>;

    /// Apply a partial update, returning the stored record afterwards
    async fn write(&self, id: &str, patch: RequestPatch) -> Result<ServiceRequest, GatewayError>;

    /// List requests matching a filter, newest first
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, GatewayError>;
}
