/// Engine error types
///
/// Every refusal the engine makes surfaces as an explicit `EngineError`; no
/// operation substitutes a default value for a failure.

use crate::request::gateway::GatewayError;
use crate::workflow::types::{Role, ServiceKind};

/// Errors raised by the registry, resolver, session and aggregator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No definition registered for this service kind
    #[error("unknown service kind: {0}")]
    UnknownServiceKind(ServiceKind),

    /// Definition rejected at registration time
    #[error("invalid workflow definition for {kind}: {reason}")]
    InvalidDefinition { kind: ServiceKind, reason: String },

    /// Caller is not the role assigned to the current stage
    #[error("role {actor} is not assigned to this stage (assigned: {assigned})")]
    NotAssigned { actor: Role, assigned: Role },

    /// Session was opened as a spectator
    #[error("session is read-only")]
    ReadOnlySession,

    /// Stage payload missing or lacking required fields
    #[error("incomplete payload for stage {stage}: {reason}")]
    IncompleteStagePayload { stage: u32, reason: String },

    /// Backing store could not be read or written
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// Request has already been finalized
    #[error("service request already completed: {0}")]
    AlreadyCompleted(String),

    /// Stored record moved on since this session last read it
    #[error("concurrency conflict: expected version {expected}, found {actual}")]
    ConcurrencyConflict { expected: u64, actual: u64 },

    /// No such service request in the store
    #[error("service request not found: {0}")]
    RequestNotFound(String),

    /// Stage number outside the definition
    #[error("stage {stage} is not part of this workflow (1..={total_stages})")]
    UnknownStage { stage: u32, total_stages: u32 },

    /// Stage exists but the workflow has not reached it yet
    #[error("stage {stage} has not been reached (current stage: {current})")]
    StageNotReached { stage: u32, current: u32 },

    /// Finalize called before the last stage
    #[error("stage {current} is not the final stage ({total_stages})")]
    NotFinalStage { current: u32, total_stages: u32 },

    /// Caller submitted a stage other than the current one
    #[error("stage {submitted} submitted but current stage is {current}")]
    StageMismatch { submitted: u32, current: u32 },

    /// Store refused to overwrite a completed stage record
    #[error("stage {0} is already recorded")]
    StageAlreadyRecorded(u32),

    /// Intake collided with an existing request id
    #[error("service request already exists: {0}")]
    RequestAlreadyExists(String),

    /// Store refused a write that would break a record invariant
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

impl From<GatewayError> for EngineError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(id) => Self::RequestNotFound(id),
            GatewayError::ConcurrencyConflict { expected, actual } => {
                Self::ConcurrencyConflict { expected, actual }
            }
            GatewayError::AlreadyCompleted(id) => Self::AlreadyCompleted(id),
            GatewayError::ImmutableStage(stage) => Self::StageAlreadyRecorded(stage),
            GatewayError::AlreadyExists(id) => Self::RequestAlreadyExists(id),
            GatewayError::Rejected(reason) => Self::WriteRejected(reason),
            other => Self::PersistenceFailure(other.to_string()),
        }
    }
}

impl EngineError {
    /// Stable machine-readable name, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownServiceKind(_) => "unknown_service_kind",
            Self::InvalidDefinition { .. } => "invalid_definition",
            Self::NotAssigned { .. } => "not_assigned",
            Self::ReadOnlySession => "read_only_session",
            Self::IncompleteStagePayload { .. } => "incomplete_stage_payload",
            Self::PersistenceFailure(_) => "persistence_failure",
            Self::AlreadyCompleted(_) => "already_completed",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::RequestNotFound(_) => "request_not_found",
            Self::UnknownStage { .. } => "unknown_stage",
            Self::StageNotReached { .. } => "stage_not_reached",
            Self::NotFinalStage { .. } => "not_final_stage",
            Self::StageMismatch { .. } => "stage_mismatch",
            Self::StageAlreadyRecorded(_) => "stage_already_recorded",
            Self::RequestAlreadyExists(_) => "request_already_exists",
            Self::WriteRejected(_) => "write_rejected",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_map_to_engine_errors() {
        assert_eq!(
            EngineError::from(GatewayError::NotFound("req-1".into())),
            EngineError::RequestNotFound("req-1".into())
        );
        assert_eq!(
            EngineError::from(GatewayError::ConcurrencyConflict {
                expected: 2,
                actual: 3
            }),
            EngineError::ConcurrencyConflict {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(
            EngineError::from(GatewayError::ImmutableStage(1)),
            EngineError::StageAlreadyRecorded(1)
        );
        assert_eq!(
            EngineError::from(GatewayError::AlreadyExists("req-1".into())),
            EngineError::RequestAlreadyExists("req-1".into())
        );
        assert_eq!(
            EngineError::from(GatewayError::Rejected("status cannot move".into())),
            EngineError::WriteRejected("status cannot move".into())
        );
        assert!(matches!(
            EngineError::from(GatewayError::Database("disk full".into())),
            EngineError::PersistenceFailure(msg) if msg.contains("disk full")
        ));
    }
}
