use async_trait::async_trait;
use uuid::Uuid;

use crate::models::nfc::EmergencyAccessModel;
use crate::repository::error::StoreResult;
use crate::repository::pagination::{Page, PageRequest};

/// Append-only store for emergency disclosure snapshots.
#[async_trait]
pub trait EmergencyAccessRepository: Send + Sync {
    async fn append(&self, record: EmergencyAccessModel) -> StoreResult<EmergencyAccessModel>;

    /// All records, newest first.
    async fn list(&self, page: PageRequest) -> StoreResult<Page<EmergencyAccessModel>>;

    /// Records for tags owned by `user_id`, newest first.
    async fn list_for_owner(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<EmergencyAccessModel>>;
}
