use medtag_db::models::audit::SecurityEventModel;
use medtag_db::repository::StoreResult;

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::SecurityEventRepositoryImpl;

impl SecurityEventRepositoryImpl {
    pub(super) async fn append_impl(
        repo: &SecurityEventRepositoryImpl,
        event: SecurityEventModel,
    ) -> StoreResult<SecurityEventModel> {
        let query = sqlx::query(
            r#"
            INSERT INTO security_event (
                id, event_type, severity, user_id, ip_address, user_agent,
                endpoint, description, additional_data, action_taken,
                is_resolved, resolved_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(event.id)
        .bind(event.event_type)
        .bind(event.severity)
        .bind(event.user_id)
        .bind(event.ip_address.as_str())
        .bind(event.user_agent.as_ref().map(|s| s.as_str()))
        .bind(event.endpoint.as_ref().map(|s| s.as_str()))
        .bind(&event.description)
        .bind(event.additional_data.as_ref())
        .bind(event.action_taken.as_deref())
        .bind(event.is_resolved)
        .bind(event.resolved_at)
        .bind(event.created_at);

        {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or_else(consumed)?;
            query
                .execute(&mut **transaction)
                .await
                .map_err(map_sqlx_error)?;
        }

        Ok(event)
    }
}
