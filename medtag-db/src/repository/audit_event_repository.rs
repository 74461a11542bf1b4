use async_trait::async_trait;
use uuid::Uuid;

use crate::models::audit::{AuditAction, AuditEventModel, AuditSeverity, ResourceKind};
use crate::repository::error::StoreResult;
use crate::repository::pagination::{Page, PageRequest};

/// Filter for audit-event listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditEventFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<ResourceKind>,
    pub severity: Option<AuditSeverity>,
    pub success: Option<bool>,
}

/// Append-only store for audit events. Rows are never updated; deletion is a
/// privileged administrative operation outside this contract.
#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: AuditEventModel) -> StoreResult<AuditEventModel>;

    /// Events matching the filter, newest first.
    async fn list(
        &self,
        filter: &AuditEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AuditEventModel>>;
}
