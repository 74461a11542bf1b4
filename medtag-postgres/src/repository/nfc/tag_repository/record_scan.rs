use chrono::{DateTime, Utc};
use uuid::Uuid;

use medtag_db::models::nfc::TagStatus;
use medtag_db::repository::StoreResult;

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::TagRepositoryImpl;

impl TagRepositoryImpl {
    /// Increment-in-place guarded by the status predicate. Two concurrent
    /// scans both match the guard and both count; a scan racing a revoke
    /// either lands before the status flip or matches no row.
    pub(super) async fn record_scan_impl(
        repo: &TagRepositoryImpl,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let query = sqlx::query(
            r#"
            UPDATE nfc_tag
            SET scan_count = scan_count + 1, last_scanned_at = $2, updated_at = $2
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(at)
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

#[cfg(test)]
mod tests {
    use crate::test_helper::{new_test_tag, setup_test_context};
    use chrono::Utc;
    use medtag_db::repository::TagRepository;

    #[tokio::test]
    #[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
    #[serial_test::serial]
    async fn test_record_scan_counts_and_respects_the_guard(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = setup_test_context().await?;
        let tags = &ctx.repos.tags;

        let tag = tags.create(new_test_tag("UID-SCAN-1")).await?;

        assert!(tags.record_scan(tag.id, Utc::now()).await?);
        assert!(tags.record_scan(tag.id, Utc::now()).await?);
        let current = tags.find_by_id(tag.id).await?.unwrap();
        assert_eq!(current.scan_count, 2);
        assert!(current.last_scanned_at.is_some());

        assert!(tags.revoke(tag.id, Utc::now(), Some("stolen")).await?);
        assert!(!tags.record_scan(tag.id, Utc::now()).await?);
        let current = tags.find_by_id(tag.id).await?.unwrap();
        assert_eq!(current.scan_count, 2);

        Ok(())
    }
}
