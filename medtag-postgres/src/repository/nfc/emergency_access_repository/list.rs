use uuid::Uuid;

use medtag_db::models::nfc::EmergencyAccessModel;
use medtag_db::repository::{Page, PageRequest, StoreError, StoreResult};

use crate::executor::consumed;
use crate::utils::{map_sqlx_error, TryFromRow};

use super::repo_impl::EmergencyAccessRepositoryImpl;

impl EmergencyAccessRepositoryImpl {
    pub(super) async fn list_impl(
        repo: &EmergencyAccessRepositoryImpl,
        owner: Option<Uuid>,
        page: PageRequest,
    ) -> StoreResult<Page<EmergencyAccessModel>> {
        let where_clause = r#"
            ($1::uuid IS NULL OR EXISTS (
                SELECT 1 FROM nfc_tag t WHERE t.id = e.nfc_tag_id AND t.user_id = $1
            ))
        "#;

        let list_sql = format!(
            "SELECT e.* FROM nfc_emergency_access e WHERE {where_clause} \
             ORDER BY e.accessed_at DESC, e.id DESC LIMIT $2 OFFSET $3"
        );
        let count_sql =
            format!("SELECT COUNT(*) FROM nfc_emergency_access e WHERE {where_clause}");

        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or_else(consumed)?;

        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(owner)
            .fetch_one(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query(&list_sql)
            .bind(owner)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(EmergencyAccessModel::try_from_row(&row).map_err(StoreError::Backend)?);
        }
        Ok(Page::new(records, total as usize, page))
    }
}
