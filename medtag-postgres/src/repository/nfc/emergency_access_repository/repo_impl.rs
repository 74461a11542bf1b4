use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};
use std::error::Error;
use uuid::Uuid;

use medtag_db::models::nfc::EmergencyAccessModel;
use medtag_db::repository::{EmergencyAccessRepository, Page, PageRequest, StoreResult};

use crate::executor::Executor;
use crate::utils::{get_heapless_string, get_optional_heapless_string, TryFromRow};

pub struct EmergencyAccessRepositoryImpl {
    pub(crate) executor: Executor,
}

impl EmergencyAccessRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

impl TryFromRow<PgRow> for EmergencyAccessModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(EmergencyAccessModel {
            id: row.try_get("id")?,
            nfc_tag_id: row.try_get("nfc_tag_id")?,
            accessed_by: row.try_get("accessed_by")?,
            accessed_at: row.try_get("accessed_at")?,
            ip_address: get_heapless_string(row, "ip_address")?,
            device_info: get_optional_heapless_string(row, "device_info")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            data_accessed: row.try_get("data_accessed")?,
            access_notes: row.try_get("access_notes")?,
        })
    }
}

#[async_trait]
impl EmergencyAccessRepository for EmergencyAccessRepositoryImpl {
    async fn append(&self, record: EmergencyAccessModel) -> StoreResult<EmergencyAccessModel> {
        Self::append_impl(self, record).await
    }

    async fn list(&self, page: PageRequest) -> StoreResult<Page<EmergencyAccessModel>> {
        Self::list_impl(self, None, page).await
    }

    async fn list_for_owner(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<EmergencyAccessModel>> {
        Self::list_impl(self, Some(user_id), page).await
    }
}
