/// In-memory implementation of PersistenceGateway

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::gateway::*;
use super::types::{RequestPatch, ServiceRequest};

/// In-memory implementation of PersistenceGateway
///
/// Used by tests and by `SERVFLOW_DATABASE_URL=memory`. Provides the same
/// write semantics as the SQLite gateway: whole-patch application under a
/// single write lock.
pub struct InMemoryGateway {
    requests: RwLock<HashMap<String, ServiceRequest>>,
    fail_writes: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Get the number of stored requests
    pub fn request_count(&self) -> usize {
        self.requests.read().len()
    }

    /// Make every subsequent `write` fail with a database error (for testing)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn create(&self, request: ServiceRequest) -> Result<(), GatewayError> {
        let mut requests = self.requests.write();
        if requests.contains_key(&request.id) {
            return Err(GatewayError::AlreadyExists(request.id));
        }
        requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<ServiceRequest, GatewayError> {
        self.requests
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn write(&self, id: &str, patch: RequestPatch) -> Result<ServiceRequest, GatewayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Database("simulated write failure".to_string()));
        }

        let mut requests = self.requests.write();
        let stored = requests
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        // Apply to a copy so a rejected patch leaves the stored record intact
        let mut updated = stored.clone();
        updated.apply(patch, Utc::now())?;
        *stored = updated.clone();

        Ok(updated)
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, GatewayError> {
        let mut matching: Vec<ServiceRequest> = self
            .requests
            .read()
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}
