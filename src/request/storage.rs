/// SQLite persistence gateway for service requests
///
/// Each request is stored as a JSON document next to a few indexed columns
/// (kind, status, version) used for filtering and for the optimistic
/// concurrency check.

use crate::request::gateway::{GatewayError, PersistenceGateway, RequestFilter};
use crate::request::types::{RequestPatch, ServiceRequest};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite-backed implementation of PersistenceGateway
#[derive(Debug, Clone)]
pub struct SqliteGateway {
    /// SQLite connection pool for the request database
    pool: SqlitePool,
}

impl SqliteGateway {
    /// Create gateway instance over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and initialize the schema
    ///
    /// In-memory URLs get a single connection, since every SQLite connection
    /// to `:memory:` is a separate database.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        if !in_memory {
            if let Some(parent) = url
                .strip_prefix("sqlite://")
                .and_then(|path| Path::new(path).parent())
                .filter(|parent| !parent.as_os_str().is_empty())
            {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow::anyhow!("Failed to create database directory '{}': {}", parent.display(), e)
                })?;
            }
        }

        tracing::info!("🗄️ Opening service request database: {}", url);
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await?;

        let gateway = Self::new(pool);
        gateway.init_schema().await?;
        Ok(gateway)
    }

    /// Initialize the service request schema
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS service_requests (
                id TEXT PRIMARY KEY,
                service_kind TEXT NOT NULL,
                status TEXT NOT NULL,
                version INTEGER NOT NULL,
                record JSON NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_service_requests_kind_status
            ON service_requests(service_kind, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Database(e.to_string())
}

fn decode(record_json: &str) -> Result<ServiceRequest, GatewayError> {
    serde_json::from_str(record_json).map_err(|e| GatewayError::Serialization(e.to_string()))
}

fn encode(request: &ServiceRequest) -> Result<String, GatewayError> {
    serde_json::to_string(request).map_err(|e| GatewayError::Serialization(e.to_string()))
}

/// SQLITE_BUSY / SQLITE_LOCKED, including their extended codes
fn is_busy(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .map_or(false, |code| matches!(code & 0xff, 5 | 6))
}

impl SqliteGateway {
    /// Error for a write whose version predicate did not hold
    ///
    /// Re-reads the stored record: a completed request reports
    /// `AlreadyCompleted`, anything else `ConcurrencyConflict`.
    async fn lost_race(&self, id: &str, expected_version: u64) -> GatewayError {
        match self.read(id).await {
            Ok(current) if current.is_completed() => GatewayError::AlreadyCompleted(current.id),
            Ok(current) => GatewayError::ConcurrencyConflict {
                expected: expected_version,
                actual: current.version,
            },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn create(&self, request: ServiceRequest) -> Result<(), GatewayError> {
        let record_json = encode(&request)?;

        let result = sqlx::query(
            r#"
            INSERT INTO service_requests (id, service_kind, status, version, record)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&request.id)
        .bind(request.service_kind.as_str())
        .bind(request.status.as_str())
        .bind(request.version as i64)
        .bind(&record_json)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::AlreadyExists(request.id));
        }
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<ServiceRequest, GatewayError> {
        let row = sqlx::query("SELECT record FROM service_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        let record_json: String = row.get("record");
        decode(&record_json)
    }

    async fn write(&self, id: &str, patch: RequestPatch) -> Result<ServiceRequest, GatewayError> {
        let expected_version = patch.expected_version;
        let mut request = self.read(id).await?;
        request.apply(patch, Utc::now())?;

        // The version predicate is the whole compare-and-swap. A single
        // autocommit UPDATE takes the write lock directly, so a racing writer
        // waits on busy_timeout and then matches no row.
        let result = sqlx::query(
            r#"
            UPDATE service_requests
            SET status = ?, version = ?, record = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(request.status.as_str())
        .bind(request.version as i64)
        .bind(encode(&request)?)
        .bind(id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                tracing::debug!("💾 Stored service request {} at version {}", id, request.version);
                Ok(request)
            }
            Ok(_) => Err(self.lost_race(id, expected_version).await),
            Err(e) if is_busy(&e) => {
                tracing::debug!("🔒 Service request {} locked by another writer: {}", id, e);
                Err(self.lost_race(id, expected_version).await)
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, GatewayError> {
        let rows = sqlx::query(
            r#"
            SELECT record FROM service_requests
            WHERE (?1 IS NULL OR service_kind = ?1)
              AND (?2 IS NULL OR status = ?2)
            "#,
        )
        .bind(filter.service_kind.as_ref().map(|kind| kind.as_str().to_string()))
        .bind(filter.status.map(|status| status.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            let record_json: String = row.get("record");
            requests.push(decode(&record_json)?);
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(requests)
    }
}
