use medtag_db::models::indexable::IndexAware;
use medtag_db::models::nfc::NfcTagModel;
use medtag_db::repository::StoreResult;

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::TagRepositoryImpl;

impl TagRepositoryImpl {
    pub(super) async fn create_impl(
        repo: &TagRepositoryImpl,
        tag: NfcTagModel,
    ) -> StoreResult<NfcTagModel> {
        let idx = tag.to_index();

        {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;

            sqlx::query(
                r#"
                INSERT INTO nfc_tag (
                    id, user_id, tag_uid, tag_type, public_key_id, checksum,
                    status, scan_count, registered_at, last_scanned_at,
                    revoked_at, revoked_reason, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(tag.id)
            .bind(tag.user_id)
            .bind(tag.tag_uid.as_str())
            .bind(tag.tag_type.as_str())
            .bind(tag.public_key_id.as_str())
            .bind(tag.checksum.as_str())
            .bind(tag.status)
            .bind(tag.scan_count)
            .bind(tag.registered_at)
            .bind(tag.last_scanned_at)
            .bind(tag.revoked_at)
            .bind(tag.revoked_reason.as_deref())
            .bind(tag.created_at)
            .bind(tag.updated_at)
            .execute(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;

            sqlx::query(
                r#"
                INSERT INTO nfc_tag_idx (tag_id, tag_uid_hash, public_key_id_hash, user_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(idx.tag_id)
            .bind(idx.tag_uid_hash)
            .bind(idx.public_key_id_hash)
            .bind(idx.user_id)
            .execute(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?;
        }

        repo.uid_cache.insert(idx.tag_uid_hash, idx.tag_id);
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helper::{new_test_tag, setup_test_context};
    use medtag_db::repository::{StoreError, TagRepository};

    #[tokio::test]
    #[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
    #[serial_test::serial]
    async fn test_create_and_find_by_uid() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let ctx = setup_test_context().await?;
        let tags = &ctx.repos.tags;

        let tag = new_test_tag("UID-CREATE-1");
        let saved = tags.create(tag.clone()).await?;
        assert_eq!(saved.id, tag.id);

        let found = tags.find_by_uid("UID-CREATE-1").await?;
        assert_eq!(found.map(|t| t.id), Some(tag.id));

        // Lookups are case sensitive.
        let miss = tags.find_by_uid("uid-create-1").await?;
        assert!(miss.is_none());

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
    #[serial_test::serial]
    async fn test_duplicate_uid_is_reported() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let ctx = setup_test_context().await?;
        let tags = &ctx.repos.tags;

        tags.create(new_test_tag("UID-DUP-1")).await?;
        let err = tags.create(new_test_tag("UID-DUP-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("tag_uid")));

        Ok(())
    }
}
