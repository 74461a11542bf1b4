use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use medtag_api::{OpsAlert, RequestContext, TagError, TagResult};
use medtag_db::models::audit::{SecurityEventKind, SecurityEventModel, SecuritySeverity};
use medtag_db::repository::{Page, PageRequest, SecurityEventFilter, SecurityEventRepository};

use crate::config::CoreConfig;
use crate::strings::{clamp, clamp_opt};

/// Counter hook for checksum mismatches.
///
/// The protocol reports every failure; the policy decides when the pattern
/// is worth a security event. Thresholds are configuration, not protocol
/// code.
pub trait IntegrityFailurePolicy: Send + Sync {
    /// Returns true when the failure pattern for this tag/IP pair has
    /// reached the alerting threshold.
    fn note_failure(&self, tag_uid: &str, ip: IpAddr) -> bool;
}

/// Sliding-window counter per `(tag_uid, ip)` with TTL-based expiry.
pub struct SlidingWindowPolicy {
    counters: moka::sync::Cache<(String, IpAddr), Arc<AtomicU32>>,
    threshold: u32,
}

impl SlidingWindowPolicy {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            counters: moka::sync::Cache::builder()
                .max_capacity(100_000)
                .time_to_live(config.integrity_failure_window)
                .build(),
            threshold: config.integrity_failure_threshold,
        }
    }
}

impl IntegrityFailurePolicy for SlidingWindowPolicy {
    fn note_failure(&self, tag_uid: &str, ip: IpAddr) -> bool {
        let counter = self
            .counters
            .get_with((tag_uid.to_string(), ip), || Arc::new(AtomicU32::new(0)));
        counter.fetch_add(1, Ordering::Relaxed) + 1 >= self.threshold
    }
}

/// Reliable storage and resolution workflow for anomalous occurrences.
///
/// Detection heuristics live with the callers; this monitor records what
/// they report and lets operators work the queue. Record failures are
/// contained like audit writes — an anomaly report must never break the
/// request that triggered it.
pub struct SecurityEventMonitor {
    events: Arc<dyn SecurityEventRepository>,
    alerts: Arc<dyn OpsAlert>,
}

impl SecurityEventMonitor {
    pub fn new(events: Arc<dyn SecurityEventRepository>, alerts: Arc<dyn OpsAlert>) -> Self {
        Self { events, alerts }
    }

    /// Record one event. Returns the stored row, or None when the write
    /// failed and was contained.
    pub async fn record(
        &self,
        ctx: &RequestContext,
        event_type: SecurityEventKind,
        severity: SecuritySeverity,
        description: impl Into<String>,
        additional_data: Option<Value>,
    ) -> Option<SecurityEventModel> {
        let event = SecurityEventModel {
            id: Uuid::new_v4(),
            event_type,
            severity,
            user_id: ctx.actor,
            ip_address: clamp::<45>(&ctx.ip_address.to_string()),
            user_agent: clamp_opt::<500>(ctx.user_agent.as_deref()),
            endpoint: clamp_opt::<255>(ctx.endpoint.as_deref()),
            description: description.into(),
            additional_data,
            action_taken: None,
            is_resolved: false,
            resolved_at: None,
            created_at: Utc::now(),
        };

        match self.events.append(event).await {
            Ok(saved) => Some(saved),
            Err(err) => {
                tracing::error!(error = %err, %event_type, "security event write failed");
                self.alerts.notify("security-events", &err.to_string());
                None
            }
        }
    }

    /// Close an event, recording what was done about it. Idempotent: a
    /// second resolution is a no-op and the first `resolved_at` stands.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        event_id: Uuid,
        action_taken: &str,
    ) -> TagResult<SecurityEventModel> {
        if !ctx.is_privileged {
            return Err(TagError::Forbidden);
        }

        let event = self
            .events
            .find_by_id(event_id)
            .await
            .map_err(TagError::store)?
            .ok_or(TagError::NotFound)?;

        if event.is_resolved {
            return Ok(event);
        }

        self.events
            .mark_resolved(event_id, action_taken, Utc::now())
            .await
            .map_err(TagError::store)?;

        self.events
            .find_by_id(event_id)
            .await
            .map_err(TagError::store)?
            .ok_or(TagError::NotFound)
    }

    /// Query events. Privileged actors see everything; ordinary actors only
    /// events attributed to them.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        mut filter: SecurityEventFilter,
        page: PageRequest,
    ) -> TagResult<Page<SecurityEventModel>> {
        if !ctx.is_privileged {
            let actor = ctx.actor.ok_or(TagError::Forbidden)?;
            filter.user_id = Some(actor);
        }
        self.events.list(&filter, page).await.map_err(TagError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, InMemorySecurityEventRepository, RecordingAlerts};
    use std::time::Duration;

    fn monitor(events: Arc<InMemorySecurityEventRepository>) -> SecurityEventMonitor {
        SecurityEventMonitor::new(events, Arc::new(RecordingAlerts::default()))
    }

    fn admin() -> RequestContext {
        RequestContext::privileged(Uuid::new_v4(), "10.0.0.1".parse().unwrap())
    }

    #[tokio::test]
    async fn resolution_is_idempotent_and_keeps_the_first_timestamp() {
        let events = Arc::new(InMemorySecurityEventRepository::default());
        let monitor = monitor(events);
        let ctx = admin();

        let event = monitor
            .record(
                &ctx,
                SecurityEventKind::InvalidToken,
                SecuritySeverity::Warning,
                "checksum mismatches from 10.0.0.7",
                None,
            )
            .await
            .unwrap();

        let resolved = monitor.resolve(&ctx, event.id, "blocked the source IP").await.unwrap();
        assert!(resolved.is_resolved);
        let first_resolution = resolved.resolved_at.unwrap();
        assert_eq!(resolved.action_taken.as_deref(), Some("blocked the source IP"));

        let again = monitor.resolve(&ctx, event.id, "noop").await.unwrap();
        assert_eq!(again.resolved_at, Some(first_resolution));
        assert_eq!(again.action_taken.as_deref(), Some("blocked the source IP"));
    }

    #[tokio::test]
    async fn resolving_an_unknown_event_is_not_found() {
        let monitor = monitor(Arc::new(InMemorySecurityEventRepository::default()));
        let err = monitor
            .resolve(&admin(), Uuid::new_v4(), "n/a")
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn resolution_requires_privilege() {
        let monitor = monitor(Arc::new(InMemorySecurityEventRepository::default()));
        let ordinary = RequestContext::authenticated(Uuid::new_v4(), "10.0.0.7".parse().unwrap());
        let err = monitor.resolve(&ordinary, Uuid::new_v4(), "n/a").await.unwrap_err();
        assert_eq!(err.outcome_code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn ordinary_actors_see_only_their_events() {
        let events = Arc::new(InMemorySecurityEventRepository::default());
        let monitor = monitor(events);
        let me = RequestContext::authenticated(Uuid::new_v4(), "10.0.0.7".parse().unwrap());
        let other = RequestContext::authenticated(Uuid::new_v4(), "10.0.0.8".parse().unwrap());

        monitor
            .record(&me, SecurityEventKind::FailedLogin, SecuritySeverity::Info, "mine", None)
            .await;
        monitor
            .record(&other, SecurityEventKind::FailedLogin, SecuritySeverity::Info, "other", None)
            .await;

        let page = monitor
            .list(&me, SecurityEventFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].user_id, me.actor);
    }

    #[test]
    fn threshold_fires_at_the_configured_count() {
        let config = test_config().with_integrity_thresholds(3, Duration::from_secs(300));
        let policy = SlidingWindowPolicy::new(&config);
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        assert!(!policy.note_failure("UID-123", ip));
        assert!(!policy.note_failure("UID-123", ip));
        assert!(policy.note_failure("UID-123", ip));
        // Counting keeps firing past the threshold.
        assert!(policy.note_failure("UID-123", ip));
    }

    #[test]
    fn counters_are_scoped_per_tag_and_ip() {
        let config = test_config().with_integrity_thresholds(2, Duration::from_secs(300));
        let policy = SlidingWindowPolicy::new(&config);
        let ip_a: IpAddr = "10.0.0.7".parse().unwrap();
        let ip_b: IpAddr = "10.0.0.8".parse().unwrap();

        assert!(!policy.note_failure("UID-123", ip_a));
        assert!(!policy.note_failure("UID-123", ip_b));
        assert!(!policy.note_failure("UID-999", ip_a));
        assert!(policy.note_failure("UID-123", ip_a));
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let config = test_config().with_integrity_thresholds(2, Duration::from_millis(50));
        let policy = SlidingWindowPolicy::new(&config);
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        assert!(!policy.note_failure("UID-123", ip));
        std::thread::sleep(Duration::from_millis(120));
        assert!(!policy.note_failure("UID-123", ip));
    }
}
