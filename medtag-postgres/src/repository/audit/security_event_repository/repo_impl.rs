use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Postgres, Row};
use std::error::Error;
use uuid::Uuid;

use medtag_db::models::audit::SecurityEventModel;
use medtag_db::repository::{
    Load, Page, PageRequest, SecurityEventFilter, SecurityEventRepository, StoreResult,
};

use crate::executor::Executor;
use crate::utils::{get_heapless_string, get_optional_heapless_string, TryFromRow};

pub struct SecurityEventRepositoryImpl {
    pub(crate) executor: Executor,
}

impl SecurityEventRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

impl TryFromRow<PgRow> for SecurityEventModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(SecurityEventModel {
            id: row.try_get("id")?,
            event_type: row.try_get("event_type")?,
            severity: row.try_get("severity")?,
            user_id: row.try_get("user_id")?,
            ip_address: get_heapless_string(row, "ip_address")?,
            user_agent: get_optional_heapless_string(row, "user_agent")?,
            endpoint: get_optional_heapless_string(row, "endpoint")?,
            description: row.try_get("description")?,
            additional_data: row.try_get("additional_data")?,
            action_taken: row.try_get("action_taken")?,
            is_resolved: row.try_get("is_resolved")?,
            resolved_at: row.try_get("resolved_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl Load<Postgres, SecurityEventModel> for SecurityEventRepositoryImpl {
    async fn load(&self, id: Uuid) -> Result<SecurityEventModel, Box<dyn Error + Send + Sync>> {
        Self::find_by_id_impl(self, id)
            .await
            .map_err(|e| -> Box<dyn Error + Send + Sync> { e.to_string().into() })?
            .ok_or_else(|| "Entity not found".into())
    }
}

#[async_trait]
impl SecurityEventRepository for SecurityEventRepositoryImpl {
    async fn append(&self, event: SecurityEventModel) -> StoreResult<SecurityEventModel> {
        Self::append_impl(self, event).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<SecurityEventModel>> {
        Self::find_by_id_impl(self, id).await
    }

    async fn mark_resolved(
        &self,
        id: Uuid,
        action_taken: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Self::mark_resolved_impl(self, id, action_taken, at).await
    }

    async fn list(
        &self,
        filter: &SecurityEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SecurityEventModel>> {
        Self::list_impl(self, filter, page).await
    }
}
