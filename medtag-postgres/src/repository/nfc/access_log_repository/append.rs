use medtag_db::models::nfc::AccessLogModel;
use medtag_db::repository::{StoreError, StoreResult};

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::AccessLogRepositoryImpl;

impl AccessLogRepositoryImpl {
    /// Chains the entry onto its credential's log before inserting: the
    /// previous entry's hash becomes this entry's antecedent, then the row
    /// hash is computed over the final contents. Both queries run on the
    /// same transaction, so appends for one credential serialize.
    pub(super) async fn append_impl(
        repo: &AccessLogRepositoryImpl,
        mut entry: AccessLogModel,
    ) -> StoreResult<AccessLogModel> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or_else(consumed)?;

        entry.antecedent_hash = match entry.nfc_tag_id {
            Some(tag_id) => sqlx::query_scalar::<_, i64>(
                r#"
                SELECT entry_hash FROM nfc_access_log
                WHERE nfc_tag_id = $1
                ORDER BY accessed_at DESC, id DESC
                LIMIT 1
                "#,
            )
            .bind(tag_id)
            .fetch_optional(&mut **transaction)
            .await
            .map_err(map_sqlx_error)?
            .unwrap_or(0),
            None => 0,
        };
        entry.entry_hash = entry
            .compute_hash()
            .map_err(|e| StoreError::Backend(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO nfc_access_log (
                id, nfc_tag_id, accessed_by, access_type, outcome,
                ip_address, user_agent, device_info, latitude, longitude,
                error_message, accessed_at, antecedent_hash, entry_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.id)
        .bind(entry.nfc_tag_id)
        .bind(entry.accessed_by)
        .bind(entry.access_type)
        .bind(entry.outcome)
        .bind(entry.ip_address.as_str())
        .bind(entry.user_agent.as_ref().map(|s| s.as_str()))
        .bind(entry.device_info.as_ref().map(|s| s.as_str()))
        .bind(entry.latitude)
        .bind(entry.longitude)
        .bind(entry.error_message.as_deref())
        .bind(entry.accessed_at)
        .bind(entry.antecedent_hash)
        .bind(entry.entry_hash)
        .execute(&mut **transaction)
        .await
        .map_err(map_sqlx_error)?;

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helper::{new_test_entry, new_test_tag, setup_test_context};
    use medtag_db::models::nfc::AccessLogModel;
    use medtag_db::repository::{AccessLogRepository, TagRepository};

    #[tokio::test]
    #[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
    #[serial_test::serial]
    async fn test_appends_build_a_verifiable_chain(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = setup_test_context().await?;
        let tags = &ctx.repos.tags;
        let logs = &ctx.repos.access_logs;

        let tag = tags.create(new_test_tag("UID-CHAIN-1")).await?;

        let first = logs.append(new_test_entry(Some(tag.id))).await?;
        assert_eq!(first.antecedent_hash, 0);
        assert_ne!(first.entry_hash, 0);

        let second = logs.append(new_test_entry(Some(tag.id))).await?;
        assert_eq!(second.antecedent_hash, first.entry_hash);

        let chain = logs.chain_for_tag(tag.id).await?;
        assert_eq!(chain.len(), 2);
        assert!(AccessLogModel::verify_chain(&chain));

        // Entries without a resolved credential stand alone.
        let orphan = logs.append(new_test_entry(None)).await?;
        assert_eq!(orphan.antecedent_hash, 0);

        Ok(())
    }
}
