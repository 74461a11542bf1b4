use medtag_db::models::nfc::EmergencyAccessModel;
use medtag_db::repository::StoreResult;

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::EmergencyAccessRepositoryImpl;

impl EmergencyAccessRepositoryImpl {
    pub(super) async fn append_impl(
        repo: &EmergencyAccessRepositoryImpl,
        record: EmergencyAccessModel,
    ) -> StoreResult<EmergencyAccessModel> {
        let query = sqlx::query(
            r#"
            INSERT INTO nfc_emergency_access (
                id, nfc_tag_id, accessed_by, accessed_at, ip_address,
                device_info, latitude, longitude, data_accessed, access_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.nfc_tag_id)
        .bind(record.accessed_by)
        .bind(record.accessed_at)
        .bind(record.ip_address.as_str())
        .bind(record.device_info.as_ref().map(|s| s.as_str()))
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.data_accessed)
        .bind(record.access_notes.as_deref());

        {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query
                .execute(&mut **transaction)
                .await
                .map_err(map_sqlx_error)?;
        }

        Ok(record)
    }
}
