use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use medtag_api::{OpsAlert, RequestContext, TagError, TagResult};
use medtag_db::models::audit::{AuditAction, AuditEventModel, AuditSeverity, ResourceKind};
use medtag_db::repository::{AuditEventFilter, AuditEventRepository, Page, PageRequest};

use crate::config::CoreConfig;
use crate::strings::{clamp, clamp_opt};

/// Marker stored in place of sensitive payload values.
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// Replaces values under denylisted keys, recursing through nested objects
/// and arrays. Key comparison is case-insensitive.
pub fn sanitize_value(value: &mut Value, redact_keys: &[String]) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if redact_keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                    *entry = Value::String(REDACTION_MARKER.to_string());
                } else {
                    sanitize_value(entry, redact_keys);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                sanitize_value(item, redact_keys);
            }
        }
        _ => {}
    }
}

/// Default severity policy: reads are Low, mutations Medium, and any failed
/// action escalates to High regardless of its kind.
pub fn classify_severity(action: AuditAction, success: bool) -> AuditSeverity {
    if !success {
        return AuditSeverity::High;
    }
    match action {
        AuditAction::Update | AuditAction::Delete | AuditAction::NfcRevoke => {
            AuditSeverity::Medium
        }
        _ => AuditSeverity::Low,
    }
}

/// Everything a caller knows about one audited action. The trail fills in
/// identity, request metadata, sanitization and severity.
#[derive(Debug, Clone)]
pub struct AuditEventDraft {
    pub action: AuditAction,
    pub resource_type: ResourceKind,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub description: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub success: bool,
    pub error_message: Option<String>,
    /// Explicit severity; when absent the default policy applies.
    pub severity: Option<AuditSeverity>,
}

impl AuditEventDraft {
    pub fn new(
        action: AuditAction,
        resource_type: ResourceKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource_id: None,
            resource_name: None,
            description: description.into(),
            old_value: None,
            new_value: None,
            success: true,
            error_message: None,
            severity: None,
        }
    }

    pub fn resource(mut self, id: impl ToString, name: impl Into<String>) -> Self {
        self.resource_id = Some(id.to_string());
        self.resource_name = Some(name.into());
        self
    }

    pub fn old_value(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// Append-only trail of sensitive actions.
///
/// Recording is fire-and-forget: a failed write never fails or rolls back
/// the operation being audited. The failure is traced and forwarded to the
/// operational alert sink instead.
pub struct AuditTrail {
    events: Arc<dyn AuditEventRepository>,
    alerts: Arc<dyn OpsAlert>,
    redact_keys: Vec<String>,
}

impl AuditTrail {
    pub fn new(
        config: &CoreConfig,
        events: Arc<dyn AuditEventRepository>,
        alerts: Arc<dyn OpsAlert>,
    ) -> Self {
        Self {
            events,
            alerts,
            redact_keys: config.redact_keys.clone(),
        }
    }

    /// Record one audited action. Never fails, never blocks the caller's
    /// response on audit storage.
    pub async fn record(&self, ctx: &RequestContext, draft: AuditEventDraft) {
        let event = self.build(ctx, draft);
        if let Err(err) = self.events.append(event).await {
            tracing::error!(error = %err, "audit event write failed");
            self.alerts.notify("audit-log", &err.to_string());
        }
    }

    fn build(&self, ctx: &RequestContext, draft: AuditEventDraft) -> AuditEventModel {
        let severity = draft
            .severity
            .unwrap_or_else(|| classify_severity(draft.action, draft.success));

        let sanitized = |value: Option<Value>| {
            value.map(|mut v| {
                sanitize_value(&mut v, &self.redact_keys);
                v
            })
        };

        AuditEventModel {
            id: Uuid::new_v4(),
            actor_id: ctx.actor,
            action: draft.action,
            resource_type: draft.resource_type,
            resource_id: clamp_opt::<255>(draft.resource_id.as_deref()),
            resource_name: clamp_opt::<255>(draft.resource_name.as_deref()),
            description: draft.description,
            severity,
            ip_address: Some(clamp::<45>(&ctx.ip_address.to_string())),
            user_agent: clamp_opt::<500>(ctx.user_agent.as_deref()),
            endpoint: clamp_opt::<255>(ctx.endpoint.as_deref()),
            method: clamp_opt::<10>(ctx.method.as_deref()),
            old_value: sanitized(draft.old_value),
            new_value: sanitized(draft.new_value),
            success: draft.success,
            error_message: draft.error_message,
            created_at: Utc::now(),
        }
    }

    /// Query the trail. Privileged actors see everything; ordinary actors
    /// only their own rows.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        mut filter: AuditEventFilter,
        page: PageRequest,
    ) -> TagResult<Page<AuditEventModel>> {
        if !ctx.is_privileged {
            let actor = ctx.actor.ok_or(TagError::Forbidden)?;
            filter.actor_id = Some(actor);
        }
        self.events.list(&filter, page).await.map_err(TagError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        test_config, FailingAuditEventRepository, InMemoryAuditEventRepository, RecordingAlerts,
    };
    use serde_json::json;

    fn trail(
        events: Arc<InMemoryAuditEventRepository>,
        alerts: Arc<RecordingAlerts>,
    ) -> AuditTrail {
        AuditTrail::new(&test_config(), events, alerts)
    }

    fn ctx() -> RequestContext {
        RequestContext::authenticated(Uuid::new_v4(), "10.0.0.7".parse().unwrap())
    }

    #[test]
    fn sanitizer_redacts_top_level_keys() {
        let mut payload = json!({"email": "a@b.c", "password": "hunter2"});
        sanitize_value(&mut payload, &["password".to_string()]);
        assert_eq!(payload["password"], REDACTION_MARKER);
        assert_eq!(payload["email"], "a@b.c");
    }

    #[test]
    fn sanitizer_recurses_into_nested_payloads() {
        let mut payload = json!({
            "profile": {"api_key": "k-123", "name": "ok"},
            "attempts": [{"token": "t-1"}, {"note": "clean"}]
        });
        let keys = vec!["api_key".to_string(), "token".to_string()];
        sanitize_value(&mut payload, &keys);
        assert_eq!(payload["profile"]["api_key"], REDACTION_MARKER);
        assert_eq!(payload["profile"]["name"], "ok");
        assert_eq!(payload["attempts"][0]["token"], REDACTION_MARKER);
        assert_eq!(payload["attempts"][1]["note"], "clean");
    }

    #[test]
    fn severity_policy_matches_the_documented_table() {
        assert_eq!(
            classify_severity(AuditAction::Read, true),
            AuditSeverity::Low
        );
        assert_eq!(
            classify_severity(AuditAction::Update, true),
            AuditSeverity::Medium
        );
        assert_eq!(
            classify_severity(AuditAction::Delete, true),
            AuditSeverity::Medium
        );
        assert_eq!(
            classify_severity(AuditAction::Read, false),
            AuditSeverity::High
        );
    }

    #[tokio::test]
    async fn recorded_events_are_sanitized() {
        let events = Arc::new(InMemoryAuditEventRepository::default());
        let alerts = Arc::new(RecordingAlerts::default());
        let trail = trail(events.clone(), alerts);

        let draft = AuditEventDraft::new(AuditAction::Create, ResourceKind::User, "user created")
            .new_value(json!({"login": "sam", "password": "hunter2"}));
        trail.record(&ctx(), draft).await;

        let stored = events.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].new_value.as_ref().unwrap()["password"], REDACTION_MARKER);
        assert_eq!(stored[0].new_value.as_ref().unwrap()["login"], "sam");
    }

    #[tokio::test]
    async fn write_failure_is_contained_and_alerted() {
        let alerts = Arc::new(RecordingAlerts::default());
        let trail = AuditTrail::new(
            &test_config(),
            Arc::new(FailingAuditEventRepository),
            alerts.clone(),
        );

        let draft = AuditEventDraft::new(AuditAction::Read, ResourceKind::System, "probe");
        trail.record(&ctx(), draft).await;

        let notes = alerts.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "audit-log");
    }

    #[tokio::test]
    async fn ordinary_actors_only_see_their_own_rows() {
        let events = Arc::new(InMemoryAuditEventRepository::default());
        let alerts = Arc::new(RecordingAlerts::default());
        let trail = trail(events.clone(), alerts);

        let mine = ctx();
        let other = ctx();
        trail
            .record(&mine, AuditEventDraft::new(AuditAction::Read, ResourceKind::System, "mine"))
            .await;
        trail
            .record(&other, AuditEventDraft::new(AuditAction::Read, ResourceKind::System, "other"))
            .await;

        let page = trail
            .list(&mine, AuditEventFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].actor_id, mine.actor);

        let admin = RequestContext::privileged(Uuid::new_v4(), "10.0.0.1".parse().unwrap());
        let page = trail
            .list(&admin, AuditEventFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn anonymous_listing_is_forbidden() {
        let events = Arc::new(InMemoryAuditEventRepository::default());
        let alerts = Arc::new(RecordingAlerts::default());
        let trail = trail(events, alerts);

        let anon = RequestContext::anonymous("10.0.0.7".parse().unwrap());
        let err = trail
            .list(&anon, AuditEventFilter::default(), PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "FORBIDDEN");
    }
}
