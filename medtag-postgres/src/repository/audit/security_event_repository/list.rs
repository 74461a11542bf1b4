use uuid::Uuid;

use medtag_db::models::audit::SecurityEventModel;
use medtag_db::repository::{Page, PageRequest, SecurityEventFilter, StoreError, StoreResult};

use crate::executor::consumed;
use crate::utils::{map_sqlx_error, TryFromRow};

use super::repo_impl::SecurityEventRepositoryImpl;

impl SecurityEventRepositoryImpl {
    pub(super) async fn find_by_id_impl(
        repo: &SecurityEventRepositoryImpl,
        id: Uuid,
    ) -> StoreResult<Option<SecurityEventModel>> {
        let query = sqlx::query("SELECT * FROM security_event WHERE id = $1").bind(id);

        let row = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query
                .fetch_optional(&mut **transaction)
                .await
                .map_err(map_sqlx_error)?
        };

        row.map(|row| SecurityEventModel::try_from_row(&row).map_err(StoreError::Backend))
            .transpose()
    }

    pub(super) async fn list_impl(
        repo: &SecurityEventRepositoryImpl,
        filter: &SecurityEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SecurityEventModel>> {
        let where_clause = r#"
            ($1::security_event_kind IS NULL OR event_type = $1)
            AND ($2::security_severity IS NULL OR severity = $2)
            AND ($3::boolean IS NULL OR is_resolved = $3)
            AND ($4::varchar IS NULL OR ip_address = $4)
            AND ($5::uuid IS NULL OR user_id = $5)
        "#;

        let list_sql = format!(
            "SELECT * FROM security_event WHERE {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT $6 OFFSET $7"
        );
        let count_sql = format!("SELECT COUNT(*) FROM security_event WHERE {where_clause}");

        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or_else(consumed)?;

        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.event_type)
            .bind(filter.severity)
            .bind(filter.is_resolved)
            .bind(filter.ip_address.as_deref())
            .bind(filter.user_id)
            .fetch_one(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query(&list_sql)
            .bind(filter.event_type)
            .bind(filter.severity)
            .bind(filter.is_resolved)
            .bind(filter.ip_address.as_deref())
            .bind(filter.user_id)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(SecurityEventModel::try_from_row(&row).map_err(StoreError::Backend)?);
        }
        Ok(Page::new(events, total as usize, page))
    }
}
