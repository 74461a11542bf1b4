use uuid::Uuid;

use medtag_db::models::nfc::AccessLogModel;
use medtag_db::repository::{AccessLogFilter, Page, PageRequest, StoreError, StoreResult};

use crate::executor::consumed;
use crate::utils::{map_sqlx_error, TryFromRow};

use super::repo_impl::AccessLogRepositoryImpl;

impl AccessLogRepositoryImpl {
    /// One statement serves both views: with `owner` present the rows are
    /// joined against tag ownership, which also drops entries that never
    /// resolved a credential.
    pub(super) async fn list_impl(
        repo: &AccessLogRepositoryImpl,
        owner: Option<Uuid>,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>> {
        let where_clause = r#"
            ($2::uuid IS NULL OR l.nfc_tag_id = $2)
            AND ($3::access_type IS NULL OR l.access_type = $3)
            AND ($4::access_outcome IS NULL OR l.outcome = $4)
            AND ($5::varchar IS NULL OR l.ip_address = $5)
            AND ($1::uuid IS NULL OR EXISTS (
                SELECT 1 FROM nfc_tag t WHERE t.id = l.nfc_tag_id AND t.user_id = $1
            ))
        "#;

        let list_sql = format!(
            "SELECT l.* FROM nfc_access_log l WHERE {where_clause} \
             ORDER BY l.accessed_at DESC, l.id DESC LIMIT $6 OFFSET $7"
        );
        let count_sql = format!("SELECT COUNT(*) FROM nfc_access_log l WHERE {where_clause}");

        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or_else(consumed)?;

        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(owner)
            .bind(filter.nfc_tag_id)
            .bind(filter.access_type)
            .bind(filter.outcome)
            .bind(filter.ip_address.as_deref())
            .fetch_one(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query(&list_sql)
            .bind(owner)
            .bind(filter.nfc_tag_id)
            .bind(filter.access_type)
            .bind(filter.outcome)
            .bind(filter.ip_address.as_deref())
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(AccessLogModel::try_from_row(&row).map_err(StoreError::Backend)?);
        }
        Ok(Page::new(entries, total as usize, page))
    }

    pub(super) async fn chain_for_tag_impl(
        repo: &AccessLogRepositoryImpl,
        nfc_tag_id: Uuid,
    ) -> StoreResult<Vec<AccessLogModel>> {
        let query = sqlx::query(
            r#"
            SELECT * FROM nfc_access_log
            WHERE nfc_tag_id = $1
            ORDER BY accessed_at ASC, id ASC
            "#,
        )
        .bind(nfc_tag_id);

        let rows = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query
                .fetch_all(&mut **transaction)
                .await
                .map_err(map_sqlx_error)?
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(AccessLogModel::try_from_row(&row).map_err(StoreError::Backend)?);
        }
        Ok(entries)
    }
}
