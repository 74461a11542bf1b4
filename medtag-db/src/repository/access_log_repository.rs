use async_trait::async_trait;
use uuid::Uuid;

use crate::models::nfc::{AccessLogModel, AccessOutcome, AccessType};
use crate::repository::error::StoreResult;
use crate::repository::pagination::{Page, PageRequest};

/// Filter for access-log listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AccessLogFilter {
    pub nfc_tag_id: Option<Uuid>,
    pub access_type: Option<AccessType>,
    pub outcome: Option<AccessOutcome>,
    pub ip_address: Option<String>,
}

/// Append-only store for access-log entries.
///
/// Implementations set the tamper-evidence fields on append: they look up the
/// previous entry of the same credential and chain `antecedent_hash` /
/// `entry_hash` before the row is written. Callers pass both fields as 0.
#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    /// Append one entry; returns it with the hash chain fields populated.
    async fn append(&self, entry: AccessLogModel) -> StoreResult<AccessLogModel>;

    /// All entries matching the filter, newest first.
    async fn list(&self, filter: &AccessLogFilter, page: PageRequest)
        -> StoreResult<Page<AccessLogModel>>;

    /// Entries restricted to tags owned by `user_id`, newest first. Entries
    /// with no resolved tag are never visible through this view.
    async fn list_for_owner(
        &self,
        user_id: Uuid,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>>;

    /// Full chain for one credential, oldest first, for verification.
    async fn chain_for_tag(&self, nfc_tag_id: Uuid) -> StoreResult<Vec<AccessLogModel>>;
}
