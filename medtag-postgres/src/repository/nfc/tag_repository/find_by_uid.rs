use medtag_db::models::nfc::NfcTagModel;
use medtag_db::repository::{StoreError, StoreResult, TagRepository};

use crate::executor::consumed;
use crate::utils::{map_sqlx_error, TryFromRow};

use super::repo_impl::TagRepositoryImpl;

impl TagRepositoryImpl {
    /// Hash probe into the index table, then an exact comparison on the main
    /// row; the hash narrows the search but never decides the match.
    pub(super) async fn find_by_uid_impl(
        repo: &TagRepositoryImpl,
        tag_uid: &str,
    ) -> StoreResult<Option<NfcTagModel>> {
        let uid_hash = medtag_db::utils::hash_as_i64(&tag_uid)
            .map_err(|e| StoreError::Backend(e.into()))?;

        if let Some(tag_id) = repo.uid_cache.get(&uid_hash) {
            if let Some(tag) = repo.find_by_id(tag_id).await? {
                if tag.tag_uid.as_str() == tag_uid {
                    return Ok(Some(tag));
                }
            }
        }

        let query = sqlx::query(
            r#"
            SELECT t.*
            FROM nfc_tag t
            JOIN nfc_tag_idx i ON i.tag_id = t.id
            WHERE i.tag_uid_hash = $1 AND t.tag_uid = $2
            "#,
        )
        .bind(uid_hash)
        .bind(tag_uid);

        let row = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query
                .fetch_optional(&mut **transaction)
                .await
                .map_err(map_sqlx_error)?
        };

        match row {
            Some(row) => {
                let tag = NfcTagModel::try_from_row(&row).map_err(StoreError::Backend)?;
                repo.uid_cache.insert(uid_hash, tag.id);
                Ok(Some(tag))
            }
            None => Ok(None),
        }
    }
}
