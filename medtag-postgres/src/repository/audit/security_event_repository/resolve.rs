use chrono::{DateTime, Utc};
use uuid::Uuid;

use medtag_db::repository::StoreResult;

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::SecurityEventRepositoryImpl;

impl SecurityEventRepositoryImpl {
    /// Resolution is single-shot at the store level: the guard on
    /// `is_resolved` makes a repeated resolve match no row, so the first
    /// `resolved_at` and `action_taken` are never overwritten.
    pub(super) async fn mark_resolved_impl(
        repo: &SecurityEventRepositoryImpl,
        id: Uuid,
        action_taken: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let query = sqlx::query(
            r#"
            UPDATE security_event
            SET is_resolved = TRUE, resolved_at = $2, action_taken = $3
            WHERE id = $1 AND is_resolved = FALSE
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(action_taken);

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
