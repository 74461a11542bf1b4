use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use medtag_api::{
    check_valid, EmergencyProfileGateway, GeoPoint, OpsAlert, ProfileFetchError, ProfileSnapshot,
    RequestContext, ScanRequest, TagError, TagResult,
};
use medtag_db::models::audit::{
    AuditAction, ResourceKind, SecurityEventKind, SecuritySeverity,
};
use medtag_db::models::nfc::{
    AccessLogModel, AccessOutcome, AccessType, EmergencyAccessModel, TagStatus,
};
use medtag_db::repository::{
    AccessLogRepository, EmergencyAccessRepository, TagRepository,
};

use crate::audit::{AuditEventDraft, AuditTrail};
use crate::checksum::ChecksumEngine;
use crate::config::CoreConfig;
use crate::lifecycle;
use crate::security::{IntegrityFailurePolicy, SecurityEventMonitor};
use crate::strings::{clamp, clamp_opt};

/// Orchestrates one scan attempt: integrity verification, privacy gating,
/// snapshot capture and statistics update.
///
/// Every call writes exactly one access-log entry, whichever path it exits
/// through, and log persistence never blocks or fails the response.
pub struct ScanProtocol {
    tags: Arc<dyn TagRepository>,
    access_logs: Arc<dyn AccessLogRepository>,
    emergency_accesses: Arc<dyn EmergencyAccessRepository>,
    gateway: Arc<dyn EmergencyProfileGateway>,
    checksum: Arc<ChecksumEngine>,
    security: Arc<SecurityEventMonitor>,
    integrity_policy: Arc<dyn IntegrityFailurePolicy>,
    audit: Arc<AuditTrail>,
    alerts: Arc<dyn OpsAlert>,
    gateway_timeout: Duration,
}

impl ScanProtocol {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &CoreConfig,
        tags: Arc<dyn TagRepository>,
        access_logs: Arc<dyn AccessLogRepository>,
        emergency_accesses: Arc<dyn EmergencyAccessRepository>,
        gateway: Arc<dyn EmergencyProfileGateway>,
        checksum: Arc<ChecksumEngine>,
        security: Arc<SecurityEventMonitor>,
        integrity_policy: Arc<dyn IntegrityFailurePolicy>,
        audit: Arc<AuditTrail>,
        alerts: Arc<dyn OpsAlert>,
    ) -> Self {
        Self {
            tags,
            access_logs,
            emergency_accesses,
            gateway,
            checksum,
            security,
            integrity_policy,
            audit,
            alerts,
            gateway_timeout: config.gateway_timeout,
        }
    }

    /// Handle one scan attempt from a possibly unauthenticated reader.
    pub async fn scan(
        &self,
        ctx: &RequestContext,
        request: ScanRequest,
    ) -> TagResult<ProfileSnapshot> {
        // Malformed input is logged too: one entry per attempt, no matter
        // how early it dies.
        let location = match check_valid(&request).and_then(|_| request.location()) {
            Ok(location) => location,
            Err(err) => {
                self.log_scan(ctx, None, None, AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        let tag = match self.tags.find_by_uid(&request.tag_uid).await {
            Ok(Some(tag)) => tag,
            Ok(None) => {
                let err = TagError::TagNotFound;
                self.log_scan(ctx, location, None, AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Err(store_err) => {
                let err = TagError::store(store_err);
                self.log_scan(ctx, location, None, AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        if let Err(err) = lifecycle::ensure_usable(&tag) {
            self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Denied, Some(err.to_string()))
                .await;
            return Err(err);
        }

        if !self
            .checksum
            .verify(&request.tag_uid, &request.public_key_id, &request.checksum)
        {
            let err = TagError::IntegrityCheckFailed;
            self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                .await;
            if self.integrity_policy.note_failure(&request.tag_uid, ctx.ip_address) {
                self.security
                    .record(
                        ctx,
                        SecurityEventKind::InvalidToken,
                        SecuritySeverity::Danger,
                        format!(
                            "repeated checksum mismatches for tag {} from {}",
                            request.tag_uid, ctx.ip_address
                        ),
                        Some(json!({ "tag_uid": request.tag_uid })),
                    )
                    .await;
            }
            return Err(err);
        }

        // Atomic increment guarded by the status predicate; losing the race
        // against a concurrent revoke surfaces here, not as a stale read.
        match self.tags.record_scan(tag.id, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => {
                let status = match self.tags.find_by_id(tag.id).await {
                    Ok(Some(current)) => current.status,
                    _ => TagStatus::Revoked,
                };
                let err = TagError::TagNotUsable {
                    status: status.to_string(),
                };
                self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Denied, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Err(store_err) => {
                let err = TagError::store(store_err);
                self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        }

        let timeout = ctx.timeout.unwrap_or(self.gateway_timeout);
        let fetched = tokio::time::timeout(timeout, self.gateway.fetch(tag.user_id)).await;

        let snapshot = match fetched {
            Err(_elapsed) => {
                let err = TagError::GatewayTimeout;
                self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Ok(Err(ProfileFetchError::NotPublic)) => {
                let err = TagError::PrivacyDenied;
                self.log_scan(
                    ctx,
                    location,
                    Some(tag.id),
                    AccessOutcome::Denied,
                    Some("profile owner disabled emergency access".to_string()),
                )
                .await;
                return Err(err);
            }
            Ok(Err(ProfileFetchError::NotFound)) => {
                let err = TagError::ProfileNotFound;
                self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Ok(Err(ProfileFetchError::Unavailable(detail))) => {
                let err = TagError::GatewayUnavailable(detail);
                self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Ok(Ok(snapshot)) => snapshot,
        };

        // Historical record gets a detached copy, never a live reference.
        let record = EmergencyAccessModel {
            id: Uuid::new_v4(),
            nfc_tag_id: tag.id,
            accessed_by: ctx.actor,
            accessed_at: Utc::now(),
            ip_address: clamp::<45>(&ctx.ip_address.to_string()),
            device_info: clamp_opt::<255>(
                ctx.device_info.as_deref().or(ctx.user_agent.as_deref()),
            ),
            latitude: location.map(|p| p.latitude),
            longitude: location.map(|p| p.longitude),
            data_accessed: snapshot.to_detached_value(),
            access_notes: None,
        };
        if let Err(store_err) = self.emergency_accesses.append(record).await {
            let err = TagError::store(store_err);
            self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                .await;
            return Err(err);
        }

        self.log_scan(ctx, location, Some(tag.id), AccessOutcome::Success, None)
            .await;

        self.audit
            .record(
                ctx,
                AuditEventDraft::new(
                    AuditAction::EmergencyAccess,
                    ResourceKind::NfcTag,
                    "emergency profile disclosed via tag scan",
                )
                .resource(tag.id, tag.tag_uid.as_str()),
            )
            .await;

        Ok(snapshot)
    }

    /// Best-effort access logging: contained, never propagated, never
    /// blocking the response.
    async fn log_scan(
        &self,
        ctx: &RequestContext,
        location: Option<GeoPoint>,
        nfc_tag_id: Option<Uuid>,
        outcome: AccessOutcome,
        error_message: Option<String>,
    ) {
        let entry = AccessLogModel {
            id: Uuid::new_v4(),
            nfc_tag_id,
            accessed_by: ctx.actor,
            access_type: AccessType::Scan,
            outcome,
            ip_address: clamp::<45>(&ctx.ip_address.to_string()),
            user_agent: clamp_opt::<500>(ctx.user_agent.as_deref()),
            device_info: clamp_opt::<255>(ctx.device_info.as_deref()),
            latitude: location.map(|p| p.latitude),
            longitude: location.map(|p| p.longitude),
            error_message,
            accessed_at: Utc::now(),
            antecedent_hash: 0,
            entry_hash: 0,
        };
        if let Err(err) = self.access_logs.append(entry).await {
            tracing::error!(error = %err, "access log write failed");
            self.alerts.notify("access-log", &err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use medtag_api::ProfileFetchError;
    use std::time::Duration;

    #[tokio::test]
    async fn successful_scan_returns_the_snapshot_and_records_everything() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        let snapshot = world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap();
        assert_eq!(snapshot.blood_type.as_deref(), Some("II+"));

        let tag = world.tag_by_uid("UID-123").unwrap();
        assert_eq!(tag.scan_count, 1);
        assert!(tag.last_scanned_at.is_some());

        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AccessOutcome::Success);
        assert_eq!(entries[0].nfc_tag_id, Some(tag.id));

        let records = world.emergency_accesses.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data_accessed["blood_type"], "II+");
    }

    #[tokio::test]
    async fn snapshot_copy_survives_later_profile_edits() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap();

        // The profile changes after the scan; the stored record must not.
        world.gateway.set_blood_type("IV-");
        let records = world.emergency_accesses.all();
        assert_eq!(records[0].data_accessed["blood_type"], "II+");
    }

    #[tokio::test]
    async fn unknown_tag_fails_with_a_null_credential_reference() {
        let world = TestWorld::new();
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());
        let request = ScanRequest::new("UID-404", "pk-1", "a".repeat(64));

        let err = world.scan_protocol().scan(&ctx, request).await.unwrap_err();
        assert_eq!(err.outcome_code(), "TAG_NOT_FOUND");

        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AccessOutcome::Failed);
        assert_eq!(entries[0].nfc_tag_id, None);
    }

    #[tokio::test]
    async fn revoked_tag_is_denied_and_names_its_status() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        world.revoke_tag("UID-123");
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        let err = world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "TAG_NOT_USABLE");
        assert!(err.to_string().contains("Revoked"));

        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AccessOutcome::Denied);

        let tag = world.tag_by_uid("UID-123").unwrap();
        assert_eq!(tag.scan_count, 0);
    }

    #[tokio::test]
    async fn checksum_mismatch_fails_and_feeds_the_threshold_policy() {
        let world = TestWorld::with_integrity_threshold(2);
        let registered = world.register_active_tag("UID-123");
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        let mut bad = registered.scan_request();
        bad.checksum = "0".repeat(64);

        let err = world
            .scan_protocol()
            .scan(&ctx, bad.clone())
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "INTEGRITY_CHECK_FAILED");
        assert!(world.security_events.all().is_empty());

        // Second mismatch crosses the threshold and raises InvalidToken.
        world.scan_protocol().scan(&ctx, bad).await.unwrap_err();
        let events = world.security_events.all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SecurityEventKind::InvalidToken);

        // Statistics untouched, two Failed log entries written.
        let tag = world.tag_by_uid("UID-123").unwrap();
        assert_eq!(tag.scan_count, 0);
        assert_eq!(world.access_logs.all().len(), 2);
    }

    #[tokio::test]
    async fn private_profile_is_denied_without_an_emergency_record() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        world.gateway.set_result(Err(ProfileFetchError::NotPublic));
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        let err = world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "PRIVACY_DENIED");

        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AccessOutcome::Denied);
        assert!(world.emergency_accesses.all().is_empty());

        // The scan was still counted; denial happened after verification.
        let tag = world.tag_by_uid("UID-123").unwrap();
        assert_eq!(tag.scan_count, 1);
    }

    #[tokio::test]
    async fn missing_profile_is_a_failed_outcome() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        world.gateway.set_result(Err(ProfileFetchError::NotFound));
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        let err = world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "PROFILE_NOT_FOUND");
        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AccessOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_gateway_times_out_as_failed() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        world.gateway.set_delay(Duration::from_secs(30));
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap())
            .with_timeout(Duration::from_secs(2));

        let err = world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "GATEWAY_TIMEOUT");
        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AccessOutcome::Failed);
    }

    #[tokio::test]
    async fn malformed_input_still_writes_exactly_one_entry() {
        let world = TestWorld::new();
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());
        let request = ScanRequest::new("UID-123", "pk-1", "short-checksum");

        let err = world.scan_protocol().scan(&ctx, request).await.unwrap_err();
        assert_eq!(err.outcome_code(), "VALIDATION_FAILED");
        assert_eq!(world.access_logs.all().len(), 1);
    }

    #[tokio::test]
    async fn log_write_failure_never_blocks_the_response() {
        let world = TestWorld::new().with_failing_access_logs();
        let registered = world.register_active_tag("UID-123");
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        let snapshot = world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap();
        assert_eq!(snapshot.blood_type.as_deref(), Some("II+"));

        let notes = world.alerts.notes();
        assert!(notes.iter().any(|(subsystem, _)| *subsystem == "access-log"));
    }

    #[tokio::test]
    async fn concurrent_scans_lose_no_updates() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        let protocol = Arc::new(world.scan_protocol());

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let protocol = protocol.clone();
            let request = registered.scan_request();
            handles.push(tokio::spawn(async move {
                let ctx = RequestContext::anonymous(format!("10.0.1.{i}").parse().unwrap());
                protocol.scan(&ctx, request).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let tag = world.tag_by_uid("UID-123").unwrap();
        assert_eq!(tag.scan_count, 16);
        assert!(tag.last_scanned_at.is_some());
        assert_eq!(world.access_logs.all().len(), 16);
        assert_eq!(world.emergency_accesses.all().len(), 16);
    }

    #[tokio::test]
    async fn access_log_chain_verifies_after_mixed_outcomes() {
        let world = TestWorld::new();
        let registered = world.register_active_tag("UID-123");
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap();
        let mut bad = registered.scan_request();
        bad.checksum = "0".repeat(64);
        world.scan_protocol().scan(&ctx, bad).await.unwrap_err();
        world
            .scan_protocol()
            .scan(&ctx, registered.scan_request())
            .await
            .unwrap();

        let tag = world.tag_by_uid("UID-123").unwrap();
        let chain = world.access_logs.chain(tag.id);
        assert_eq!(chain.len(), 3);
        assert!(AccessLogModel::verify_chain(&chain));
    }
}
