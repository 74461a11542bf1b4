use medtag_db::models::audit::AuditEventModel;
use medtag_db::repository::{AuditEventFilter, Page, PageRequest, StoreError, StoreResult};

use crate::executor::consumed;
use crate::utils::{map_sqlx_error, TryFromRow};

use super::repo_impl::AuditEventRepositoryImpl;

impl AuditEventRepositoryImpl {
    pub(super) async fn list_impl(
        repo: &AuditEventRepositoryImpl,
        filter: &AuditEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AuditEventModel>> {
        let where_clause = r#"
            ($1::uuid IS NULL OR actor_id = $1)
            AND ($2::audit_action IS NULL OR action = $2)
            AND ($3::resource_kind IS NULL OR resource_type = $3)
            AND ($4::audit_severity IS NULL OR severity = $4)
            AND ($5::boolean IS NULL OR success = $5)
        "#;

        let list_sql = format!(
            "SELECT * FROM audit_event WHERE {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT $6 OFFSET $7"
        );
        let count_sql = format!("SELECT COUNT(*) FROM audit_event WHERE {where_clause}");

        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or_else(consumed)?;

        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.actor_id)
            .bind(filter.action)
            .bind(filter.resource_type)
            .bind(filter.severity)
            .bind(filter.success)
            .fetch_one(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query(&list_sql)
            .bind(filter.actor_id)
            .bind(filter.action)
            .bind(filter.resource_type)
            .bind(filter.severity)
            .bind(filter.success)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(AuditEventModel::try_from_row(&row).map_err(StoreError::Backend)?);
        }
        Ok(Page::new(events, total as usize, page))
    }
}
