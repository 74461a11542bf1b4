use medtag_db::models::audit::AuditEventModel;
use medtag_db::repository::StoreResult;

use crate::executor::consumed;
use crate::utils::map_sqlx_error;

use super::repo_impl::AuditEventRepositoryImpl;

impl AuditEventRepositoryImpl {
    pub(super) async fn append_impl(
        repo: &AuditEventRepositoryImpl,
        event: AuditEventModel,
    ) -> StoreResult<AuditEventModel> {
        let query = sqlx::query(
            r#"
            INSERT INTO audit_event (
                id, actor_id, action, resource_type, resource_id, resource_name,
                description, severity, ip_address, user_agent, endpoint, method,
                old_value, new_value, success, error_message, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(event.id)
        .bind(event.actor_id)
        .bind(event.action)
        .bind(event.resource_type)
        .bind(event.resource_id.as_ref().map(|s| s.as_str()))
        .bind(event.resource_name.as_ref().map(|s| s.as_str()))
        .bind(&event.description)
        .bind(event.severity)
        .bind(event.ip_address.as_ref().map(|s| s.as_str()))
        .bind(event.user_agent.as_ref().map(|s| s.as_str()))
        .bind(event.endpoint.as_ref().map(|s| s.as_str()))
        .bind(event.method.as_ref().map(|s| s.as_str()))
        .bind(event.old_value.as_ref())
        .bind(event.new_value.as_ref())
        .bind(event.success)
        .bind(event.error_message.as_deref())
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
