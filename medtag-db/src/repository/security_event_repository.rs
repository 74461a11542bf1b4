use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::audit::{SecurityEventKind, SecurityEventModel, SecuritySeverity};
use crate::repository::error::StoreResult;
use crate::repository::pagination::{Page, PageRequest};

/// Filter for security-event listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SecurityEventFilter {
    pub event_type: Option<SecurityEventKind>,
    pub severity: Option<SecuritySeverity>,
    pub is_resolved: Option<bool>,
    pub ip_address: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Store for security events: append, resolution workflow, and queries.
#[async_trait]
pub trait SecurityEventRepository: Send + Sync {
    async fn append(&self, event: SecurityEventModel) -> StoreResult<SecurityEventModel>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<SecurityEventModel>>;

    /// Set `is_resolved`, `resolved_at` and `action_taken`, only if the event
    /// is still open.
    ///
    /// Returns `false` when the event was already resolved; the first
    /// `resolved_at` always wins.
    async fn mark_resolved(
        &self,
        id: Uuid,
        action_taken: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Events matching the filter, newest first.
    async fn list(
        &self,
        filter: &SecurityEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SecurityEventModel>>;
}
