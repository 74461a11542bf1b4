use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::nfc::NfcTagModel;
use crate::repository::error::StoreResult;

/// Durable record of each tag's identity, status and scan statistics; the
/// single source of truth for lifecycle state.
///
/// All read-then-write operations (`record_scan`, `revoke`) are guarded by
/// the status predicate inside the store so that a scan racing a revocation
/// never acts on a stale-Active read.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Persist a freshly registered tag together with its index row.
    ///
    /// Fails with [`StoreError::Duplicate`](crate::repository::StoreError)
    /// when `tag_uid` or `public_key_id` is already taken (exact,
    /// case-sensitive match).
    async fn create(&self, tag: NfcTagModel) -> StoreResult<NfcTagModel>;

    /// Exact, case-sensitive lookup by the physical tag identifier.
    async fn find_by_uid(&self, tag_uid: &str) -> StoreResult<Option<NfcTagModel>>;

    /// Lookup by primary key.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<NfcTagModel>>;

    /// Atomically bump `scan_count` and set `last_scanned_at`, only while the
    /// tag is still Active.
    ///
    /// Returns `false` when no row changed, i.e. the tag left the Active
    /// state before this statement ran. Safe under concurrent scans: the
    /// increment happens in the store, not read-modify-write in the caller.
    async fn record_scan(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Atomically move an Active tag to Revoked, recording `revoked_at` and
    /// `revoked_reason` in the same statement.
    ///
    /// Returns `false` when the tag was not Active anymore.
    async fn revoke(&self, id: Uuid, at: DateTime<Utc>, reason: Option<&str>)
        -> StoreResult<bool>;

    /// All tags registered to one user, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<NfcTagModel>>;
}
