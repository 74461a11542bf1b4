use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};
use std::error::Error;
use uuid::Uuid;

use medtag_db::models::nfc::AccessLogModel;
use medtag_db::repository::{
    AccessLogFilter, AccessLogRepository, Page, PageRequest, StoreResult,
};

use crate::executor::Executor;
use crate::utils::{get_heapless_string, get_optional_heapless_string, TryFromRow};

pub struct AccessLogRepositoryImpl {
    pub(crate) executor: Executor,
}

impl AccessLogRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

impl TryFromRow<PgRow> for AccessLogModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(AccessLogModel {
            id: row.try_get("id")?,
            nfc_tag_id: row.try_get("nfc_tag_id")?,
            accessed_by: row.try_get("accessed_by")?,
            access_type: row.try_get("access_type")?,
            outcome: row.try_get("outcome")?,
            ip_address: get_heapless_string(row, "ip_address")?,
            user_agent: get_optional_heapless_string(row, "user_agent")?,
            device_info: get_optional_heapless_string(row, "device_info")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            error_message: row.try_get("error_message")?,
            accessed_at: row.try_get("accessed_at")?,
            antecedent_hash: row.try_get("antecedent_hash")?,
            entry_hash: row.try_get("entry_hash")?,
        })
    }
}

#[async_trait]
impl AccessLogRepository for AccessLogRepositoryImpl {
    async fn append(&self, entry: AccessLogModel) -> StoreResult<AccessLogModel> {
        Self::append_impl(self, entry).await
    }

    async fn list(
        &self,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>> {
        Self::list_impl(self, None, filter, page).await
    }

    async fn list_for_owner(
        &self,
        user_id: Uuid,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>> {
        Self::list_impl(self, Some(user_id), filter, page).await
    }

    async fn chain_for_tag(&self, nfc_tag_id: Uuid) -> StoreResult<Vec<AccessLogModel>> {
        Self::chain_for_tag_impl(self, nfc_tag_id).await
    }
}
