use std::sync::Arc;

use moka::sync::Cache;
use sqlx::PgPool;
use uuid::Uuid;

use medtag_db::repository::StoreError;

use crate::executor::Executor;
use crate::repository::audit::audit_event_repository::AuditEventRepositoryImpl;
use crate::repository::audit::security_event_repository::SecurityEventRepositoryImpl;
use crate::repository::nfc::access_log_repository::AccessLogRepositoryImpl;
use crate::repository::nfc::emergency_access_repository::EmergencyAccessRepositoryImpl;
use crate::repository::nfc::tag_repository::TagRepositoryImpl;

/// Entry point for building per-request repository sets over a shared pool.
///
/// The UID index cache lives here so every request benefits from lookups
/// resolved by earlier ones; the mapping from `tag_uid_hash` to tag id is
/// immutable (UIDs are never reused), so the cache needs no invalidation.
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
    uid_cache: Cache<i64, Uuid>,
}

impl PostgresRepositories {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            uid_cache: Cache::new(100_000),
        }
    }

    /// Create all repositories sharing a single transaction.
    pub async fn create_repositories(&self) -> Result<Repositories, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let executor = Executor::new(tx);

        Ok(Repositories {
            tags: Arc::new(TagRepositoryImpl::new(
                executor.clone(),
                self.uid_cache.clone(),
            )),
            access_logs: Arc::new(AccessLogRepositoryImpl::new(executor.clone())),
            emergency_accesses: Arc::new(EmergencyAccessRepositoryImpl::new(executor.clone())),
            audit_events: Arc::new(AuditEventRepositoryImpl::new(executor.clone())),
            security_events: Arc::new(SecurityEventRepositoryImpl::new(executor.clone())),
            executor,
        })
    }

    pub fn pool(&self) -> &Arc<PgPool> {
        &self.pool
    }
}

/// One request's repositories, all bound to the same transaction.
pub struct Repositories {
    pub tags: Arc<TagRepositoryImpl>,
    pub access_logs: Arc<AccessLogRepositoryImpl>,
    pub emergency_accesses: Arc<EmergencyAccessRepositoryImpl>,
    pub audit_events: Arc<AuditEventRepositoryImpl>,
    pub security_events: Arc<SecurityEventRepositoryImpl>,
    pub executor: Executor,
}

impl Repositories {
    pub async fn commit(self) -> Result<(), StoreError> {
        self.executor.commit().await
    }
}
