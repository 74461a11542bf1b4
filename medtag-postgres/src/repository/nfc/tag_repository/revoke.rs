use chrono::{DateTime, Utc};
use uuid::Uuid;

use medtag_db::models::nfc::TagStatus;
use medtag_db::repository::StoreResult;

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::TagRepositoryImpl;

impl TagRepositoryImpl {
    /// Status change, `revoked_at` and `revoked_reason` land in a single
    /// guarded statement; only an Active row can be revoked.
    pub(super) async fn revoke_impl(
        repo: &TagRepositoryImpl,
        id: Uuid,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> StoreResult<bool> {
        let query = sqlx::query(
            r#"
            UPDATE nfc_tag
            SET status = $2, revoked_at = $3, revoked_reason = $4, updated_at = $3
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(id)
        .bind(TagStatus::Revoked)
        .bind(at)
        .bind(reason)
        .bind(TagStatus::Active);

        let result = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query
                .execute(&mut **transaction)
                .await
                .map_err(map_sqlx_error)?
        };

        Ok(result.rows_affected() > 0)
    }
}
