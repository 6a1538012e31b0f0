/// Service Request Persistence Layer
///
/// The durable record the engine drives and the gateway contract it needs
/// from a backing store:
/// - Record types (ServiceRequest, StageRecord, CompletionData, RequestPatch)
/// - PersistenceGateway trait with optimistic concurrency
/// - In-memory and SQLite implementations

pub mod types;

pub mod gateway;

pub mod memory;

// SQLite persistence with sqlx
pub mod storage;

pub use gateway::{GatewayError, PersistenceGateway, RequestFilter};
pub use memory::InMemoryGateway;
pub use storage::SqliteGateway;
pub use types::{CompletionData, RequestPatch, RequestStatus, ServiceRequest, StageRecord};
