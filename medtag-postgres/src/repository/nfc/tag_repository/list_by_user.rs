use uuid::Uuid;

use medtag_db::models::nfc::NfcTagModel;
use medtag_db::repository::{StoreError, StoreResult};

use crate::executor::consumed;
use crate::utils::{map_sqlx_error, TryFromRow};

use super::repo_impl::TagRepositoryImpl;

impl TagRepositoryImpl {
    pub(super) async fn list_by_user_impl(
        repo: &TagRepositoryImpl,
        user_id: Uuid,
    ) -> StoreResult<Vec<NfcTagModel>> {
        let query = sqlx::query(
            "SELECT * FROM nfc_tag WHERE user_id = $1 ORDER BY registered_at DESC",
        )
        .bind(user_id);

        let rows = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query
                .fetch_all(&mut **transaction)
                .await
                .map_err(map_sqlx_error)?
        };

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            tags.push(NfcTagModel::try_from_row(&row).map_err(StoreError::Backend)?);
        }
        Ok(tags)
    }
}
