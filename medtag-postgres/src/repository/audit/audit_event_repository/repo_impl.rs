use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};
use std::error::Error;

use medtag_db::models::audit::AuditEventModel;
use medtag_db::repository::{AuditEventFilter, AuditEventRepository, Page, PageRequest, StoreResult};

use crate::executor::Executor;
use crate::utils::{get_optional_heapless_string, TryFromRow};

pub struct AuditEventRepositoryImpl {
    pub(crate) executor: Executor,
}

impl AuditEventRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

impl TryFromRow<PgRow> for AuditEventModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(AuditEventModel {
            id: row.try_get("id")?,
            actor_id: row.try_get("actor_id")?,
            action: row.try_get("action")?,
            resource_type: row.try_get("resource_type")?,
            resource_id: get_optional_heapless_string(row, "resource_id")?,
            resource_name: get_optional_heapless_string(row, "resource_name")?,
            description: row.try_get("description")?,
            severity: row.try_get("severity")?,
            ip_address: get_optional_heapless_string(row, "ip_address")?,
            user_agent: get_optional_heapless_string(row, "user_agent")?,
            endpoint: get_optional_heapless_string(row, "endpoint")?,
            method: get_optional_heapless_string(row, "method")?,
            old_value: row.try_get("old_value")?,
            new_value: row.try_get("new_value")?,
            success: row.try_get("success")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl AuditEventRepository for AuditEventRepositoryImpl {
    async fn append(&self, event: AuditEventModel) -> StoreResult<AuditEventModel> {
        Self::append_impl(self, event).await
    }

    async fn list(
        &self,
        filter: &AuditEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AuditEventModel>> {
        Self::list_impl(self, filter, page).await
    }
}
