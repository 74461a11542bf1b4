use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use sqlx::{postgres::PgRow, Postgres, Row};
use std::collections::HashMap;
use std::error::Error;
use uuid::Uuid;

use medtag_db::models::nfc::NfcTagModel;
use medtag_db::repository::{
    ExistByIds, Load, LoadBatch, StoreResult, TagRepository,
};

use crate::executor::{consumed, Executor};
use crate::utils::{get_heapless_string, TryFromRow};

pub struct TagRepositoryImpl {
    pub(crate) executor: Executor,
    /// `tag_uid_hash` to tag id. The mapping never changes (UIDs are unique
    /// forever), so entries are inserted once and trusted afterwards.
    pub(crate) uid_cache: Cache<i64, Uuid>,
}

impl TagRepositoryImpl {
    pub fn new(executor: Executor, uid_cache: Cache<i64, Uuid>) -> Self {
        Self { executor, uid_cache }
    }

    pub(super) async fn fetch_batch(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<Option<NfcTagModel>>, Box<dyn Error + Send + Sync>> {
        let query = sqlx::query("SELECT * FROM nfc_tag WHERE id = ANY($1)")
            .bind(ids.to_vec());
        let rows = {
            let mut tx = self.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query.fetch_all(&mut **transaction).await?
        };

        let mut by_id: HashMap<Uuid, NfcTagModel> = HashMap::with_capacity(rows.len());
        for row in rows {
            let tag = NfcTagModel::try_from_row(&row)?;
            by_id.insert(tag.id, tag);
        }
        Ok(ids.iter().map(|id| by_id.remove(id)).collect())
    }
}

impl TryFromRow<PgRow> for NfcTagModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(NfcTagModel {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            tag_uid: get_heapless_string(row, "tag_uid")?,
            tag_type: get_heapless_string(row, "tag_type")?,
            public_key_id: get_heapless_string(row, "public_key_id")?,
            checksum: get_heapless_string(row, "checksum")?,
            status: row.try_get("status")?,
            scan_count: row.try_get("scan_count")?,
            registered_at: row.try_get("registered_at")?,
            last_scanned_at: row.try_get("last_scanned_at")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_reason: row.try_get("revoked_reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl Load<Postgres, NfcTagModel> for TagRepositoryImpl {
    async fn load(&self, id: Uuid) -> Result<NfcTagModel, Box<dyn Error + Send + Sync>> {
        let results = self.fetch_batch(&[id]).await?;
        results
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| "Entity not found".into())
    }
}

#[async_trait]
impl LoadBatch<Postgres, NfcTagModel> for TagRepositoryImpl {
    async fn load_batch(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<Option<NfcTagModel>>, Box<dyn Error + Send + Sync>> {
        self.fetch_batch(ids).await
    }
}

#[async_trait]
impl ExistByIds<Postgres> for TagRepositoryImpl {
    async fn exist_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<(Uuid, bool)>, Box<dyn Error + Send + Sync>> {
        let found = self.fetch_batch(ids).await?;
        Ok(ids
            .iter()
            .zip(found)
            .map(|(id, tag)| (*id, tag.is_some()))
            .collect())
    }
}

#[async_trait]
impl TagRepository for TagRepositoryImpl {
    async fn create(&self, tag: NfcTagModel) -> StoreResult<NfcTagModel> {
        Self::create_impl(self, tag).await
    }

    async fn find_by_uid(&self, tag_uid: &str) -> StoreResult<Option<NfcTagModel>> {
        Self::find_by_uid_impl(self, tag_uid).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<NfcTagModel>> {
        let results = self
            .fetch_batch(&[id])
            .await
            .map_err(medtag_db::repository::StoreError::Backend)?;
        Ok(results.into_iter().next().flatten())
    }

    async fn record_scan(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        Self::record_scan_impl(self, id, at).await
    }

    async fn revoke(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> StoreResult<bool> {
        Self::revoke_impl(self, id, at, reason).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<NfcTagModel>> {
        Self::list_by_user_impl(self, user_id).await
    }
}
