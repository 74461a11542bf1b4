use std::sync::Arc;

use chrono::Utc;
use heapless::String as HeaplessString;
use serde_json::json;
use uuid::Uuid;

use medtag_api::{
    check_valid, OpsAlert, RegisterRequest, RequestContext, RevokeRequest, TagError, TagResult,
};
use medtag_db::models::audit::{AuditAction, ResourceKind};
use medtag_db::models::nfc::{
    AccessLogModel, AccessOutcome, AccessType, EmergencyAccessModel, NfcTagModel, TagStatus,
};
use medtag_db::repository::{
    AccessLogFilter, AccessLogRepository, EmergencyAccessRepository, Page, PageRequest,
    StoreError, TagRepository,
};

use crate::audit::{AuditEventDraft, AuditTrail};
use crate::checksum::ChecksumEngine;
use crate::strings::{clamp, clamp_opt};

/// Payload written onto the physical tag at provisioning time.
#[derive(Debug, Clone)]
pub struct TagProvisioningData {
    pub tag_id: Uuid,
    pub public_key_id: String,
    pub checksum: String,
}

/// Registration result: the stored credential plus the data to burn.
#[derive(Debug, Clone)]
pub struct RegisteredTag {
    pub tag: NfcTagModel,
    pub nfc_data: TagProvisioningData,
}

/// Registration, revocation and listing of credentials.
///
/// Scanning has its own orchestrator (crate::scan); everything here requires
/// an authenticated actor.
pub struct TagDirectory {
    tags: Arc<dyn TagRepository>,
    access_logs: Arc<dyn AccessLogRepository>,
    emergency_accesses: Arc<dyn EmergencyAccessRepository>,
    checksum: Arc<ChecksumEngine>,
    audit: Arc<AuditTrail>,
    alerts: Arc<dyn OpsAlert>,
}

impl TagDirectory {
    pub fn new(
        tags: Arc<dyn TagRepository>,
        access_logs: Arc<dyn AccessLogRepository>,
        emergency_accesses: Arc<dyn EmergencyAccessRepository>,
        checksum: Arc<ChecksumEngine>,
        audit: Arc<AuditTrail>,
        alerts: Arc<dyn OpsAlert>,
    ) -> Self {
        Self {
            tags,
            access_logs,
            emergency_accesses,
            checksum,
            audit,
            alerts,
        }
    }

    /// Register a new tag for the acting user.
    ///
    /// Mints a fresh `public_key_id`, computes the checksum once, and stores
    /// the credential in the Active state. The profile-existence precondition
    /// is the profile subsystem's check at the transport boundary.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        request: RegisterRequest,
    ) -> TagResult<RegisteredTag> {
        check_valid(&request)?;
        let actor = ctx.actor.ok_or(TagError::Forbidden)?;

        let public_key_id = Uuid::new_v4().to_string();
        let checksum = self.checksum.generate(&request.tag_uid, &public_key_id);
        let now = Utc::now();

        let tag = NfcTagModel {
            id: Uuid::new_v4(),
            user_id: actor,
            tag_uid: HeaplessString::try_from(request.tag_uid.as_str())
                .map_err(|_| TagError::Validation("tag_uid is too long".to_string()))?,
            tag_type: HeaplessString::try_from(request.tag_type.as_str())
                .map_err(|_| TagError::Validation("tag_type is too long".to_string()))?,
            public_key_id: HeaplessString::try_from(public_key_id.as_str())
                .map_err(|_| TagError::Validation("public_key_id is too long".to_string()))?,
            checksum: HeaplessString::try_from(checksum.as_str())
                .map_err(|_| TagError::Validation("checksum is too long".to_string()))?,
            status: TagStatus::Active,
            scan_count: 0,
            registered_at: now,
            last_scanned_at: None,
            revoked_at: None,
            revoked_reason: None,
            created_at: now,
            updated_at: now,
        };

        let saved = match self.tags.create(tag).await {
            Ok(saved) => saved,
            Err(StoreError::Duplicate(_)) => {
                let err = TagError::DuplicateTag;
                self.log_access(ctx, AccessType::Register, None, AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Err(store_err) => {
                let err = TagError::store(store_err);
                self.log_access(ctx, AccessType::Register, None, AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        self.log_access(ctx, AccessType::Register, Some(saved.id), AccessOutcome::Success, None)
            .await;
        self.audit
            .record(
                ctx,
                AuditEventDraft::new(
                    AuditAction::NfcRegister,
                    ResourceKind::NfcTag,
                    "NFC tag registered",
                )
                .resource(saved.id, saved.tag_uid.as_str())
                .new_value(json!({
                    "tag_uid": saved.tag_uid.as_str(),
                    "tag_type": saved.tag_type.as_str(),
                    "public_key_id": saved.public_key_id.as_str(),
                })),
            )
            .await;

        Ok(RegisteredTag {
            nfc_data: TagProvisioningData {
                tag_id: saved.id,
                public_key_id,
                checksum,
            },
            tag: saved,
        })
    }

    /// Revoke a tag owned by the acting user (privileged actors may revoke
    /// any tag). The status change, `revoked_at` and `revoked_reason` land
    /// atomically; racing scans observe a consistent state.
    pub async fn revoke(
        &self,
        ctx: &RequestContext,
        request: RevokeRequest,
    ) -> TagResult<NfcTagModel> {
        check_valid(&request)?;
        let actor = ctx.actor.ok_or(TagError::Forbidden)?;

        let tag = match self.tags.find_by_id(request.tag_id).await {
            Ok(Some(tag)) => tag,
            Ok(None) => {
                let err = TagError::TagNotFound;
                self.log_access(ctx, AccessType::Revoke, None, AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Err(store_err) => {
                let err = TagError::store(store_err);
                self.log_access(ctx, AccessType::Revoke, None, AccessOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        // Ownership is resolved like a lookup miss so strangers cannot probe
        // which tag ids exist.
        if tag.user_id != actor && !ctx.is_privileged {
            let err = TagError::TagNotFound;
            self.log_access(ctx, AccessType::Revoke, None, AccessOutcome::Failed, Some(err.to_string()))
                .await;
            return Err(err);
        }

        if tag.status != TagStatus::Active {
            let err = TagError::AlreadyRevoked;
            self.log_access(ctx, AccessType::Revoke, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                .await;
            return Err(err);
        }

        let revoked = self
            .tags
            .revoke(tag.id, Utc::now(), request.reason.as_deref())
            .await
            .map_err(TagError::store)?;
        if !revoked {
            // Lost the race against another revocation.
            let err = TagError::AlreadyRevoked;
            self.log_access(ctx, AccessType::Revoke, Some(tag.id), AccessOutcome::Failed, Some(err.to_string()))
                .await;
            return Err(err);
        }

        let updated = self
            .tags
            .find_by_id(tag.id)
            .await
            .map_err(TagError::store)?
            .ok_or(TagError::TagNotFound)?;

        self.log_access(ctx, AccessType::Revoke, Some(tag.id), AccessOutcome::Success, None)
            .await;
        self.audit
            .record(
                ctx,
                AuditEventDraft::new(
                    AuditAction::NfcRevoke,
                    ResourceKind::NfcTag,
                    "NFC tag revoked",
                )
                .resource(tag.id, tag.tag_uid.as_str())
                .old_value(json!({ "status": TagStatus::Active.to_string() }))
                .new_value(json!({
                    "status": TagStatus::Revoked.to_string(),
                    "reason": request.reason,
                })),
            )
            .await;

        Ok(updated)
    }

    /// Tags registered to the acting user, newest first.
    pub async fn list_tags(&self, ctx: &RequestContext) -> TagResult<Vec<NfcTagModel>> {
        let actor = ctx.actor.ok_or(TagError::Forbidden)?;
        self.tags.list_by_user(actor).await.map_err(TagError::store)
    }

    /// Access-log listing with the ownership rule: privileged actors see all
    /// entries, ordinary actors only entries of tags they own.
    pub async fn list_access_logs(
        &self,
        ctx: &RequestContext,
        filter: AccessLogFilter,
        page: PageRequest,
    ) -> TagResult<Page<AccessLogModel>> {
        if ctx.is_privileged {
            return self.access_logs.list(&filter, page).await.map_err(TagError::store);
        }
        let actor = ctx.actor.ok_or(TagError::Forbidden)?;
        self.access_logs
            .list_for_owner(actor, &filter, page)
            .await
            .map_err(TagError::store)
    }

    /// Emergency disclosure history under the same ownership rule.
    pub async fn list_emergency_accesses(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> TagResult<Page<EmergencyAccessModel>> {
        if ctx.is_privileged {
            return self.emergency_accesses.list(page).await.map_err(TagError::store);
        }
        let actor = ctx.actor.ok_or(TagError::Forbidden)?;
        self.emergency_accesses
            .list_for_owner(actor, page)
            .await
            .map_err(TagError::store)
    }

    async fn log_access(
        &self,
        ctx: &RequestContext,
        access_type: AccessType,
        nfc_tag_id: Option<Uuid>,
        outcome: AccessOutcome,
        error_message: Option<String>,
    ) {
        let entry = AccessLogModel {
            id: Uuid::new_v4(),
            nfc_tag_id,
            accessed_by: ctx.actor,
            access_type,
            outcome,
            ip_address: clamp::<45>(&ctx.ip_address.to_string()),
            user_agent: clamp_opt::<500>(ctx.user_agent.as_deref()),
            device_info: clamp_opt::<255>(ctx.device_info.as_deref()),
            latitude: None,
            longitude: None,
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

    fn owner_ctx(actor: Uuid) -> RequestContext {
        RequestContext::authenticated(actor, "10.0.0.7".parse().unwrap())
    }

    #[tokio::test]
    async fn registration_creates_an_active_tag_with_a_valid_checksum() {
        let world = TestWorld::new();
        let directory = world.tag_directory();
        let actor = Uuid::new_v4();

        let registered = directory
            .register(&owner_ctx(actor), RegisterRequest::new("UID-123"))
            .await
            .unwrap();

        assert_eq!(registered.tag.status, TagStatus::Active);
        assert_eq!(registered.tag.tag_type.as_str(), "NTAG215");
        assert_eq!(registered.tag.user_id, actor);
        assert_eq!(registered.tag.scan_count, 0);

        // Checksum binds the physical UID to the freshly minted key id.
        assert!(world.checksum.verify(
            "UID-123",
            &registered.nfc_data.public_key_id,
            &registered.nfc_data.checksum,
        ));

        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].access_type, AccessType::Register);
        assert_eq!(entries[0].outcome, AccessOutcome::Success);

        let audits = world.audit_events.all();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::NfcRegister);
    }

    #[tokio::test]
    async fn duplicate_uid_is_rejected() {
        let world = TestWorld::new();
        let directory = world.tag_directory();

        directory
            .register(&owner_ctx(Uuid::new_v4()), RegisterRequest::new("UID-123"))
            .await
            .unwrap();
        let err = directory
            .register(&owner_ctx(Uuid::new_v4()), RegisterRequest::new("UID-123"))
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "DUPLICATE_TAG");

        // One success entry, one failure entry.
        let entries = world.access_logs.all();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].outcome, AccessOutcome::Failed);
    }

    #[tokio::test]
    async fn anonymous_registration_is_forbidden() {
        let world = TestWorld::new();
        let directory = world.tag_directory();
        let anon = RequestContext::anonymous("10.0.0.7".parse().unwrap());

        let err = directory
            .register(&anon, RegisterRequest::new("UID-123"))
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn revocation_is_recorded_and_final() {
        let world = TestWorld::new();
        let directory = world.tag_directory();
        let actor = Uuid::new_v4();

        let registered = directory
            .register(&owner_ctx(actor), RegisterRequest::new("UID-123"))
            .await
            .unwrap();

        let revoked = directory
            .revoke(
                &owner_ctx(actor),
                RevokeRequest::new(registered.tag.id).with_reason("tag lost at the park"),
            )
            .await
            .unwrap();
        assert_eq!(revoked.status, TagStatus::Revoked);
        assert!(revoked.revoked_at.is_some());
        assert_eq!(revoked.revoked_reason.as_deref(), Some("tag lost at the park"));

        // Second revocation: conflict, no state change, one failure entry.
        let err = directory
            .revoke(&owner_ctx(actor), RevokeRequest::new(registered.tag.id))
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "ALREADY_REVOKED");

        let current = world.tag_by_uid("UID-123").unwrap();
        assert_eq!(current.revoked_reason.as_deref(), Some("tag lost at the park"));

        let revoke_entries: Vec<_> = world
            .access_logs
            .all()
            .into_iter()
            .filter(|e| e.access_type == AccessType::Revoke)
            .collect();
        assert_eq!(revoke_entries.len(), 2);
        assert_eq!(revoke_entries[0].outcome, AccessOutcome::Success);
        assert_eq!(revoke_entries[1].outcome, AccessOutcome::Failed);
    }

    #[tokio::test]
    async fn strangers_cannot_revoke_or_probe_tag_ids() {
        let world = TestWorld::new();
        let directory = world.tag_directory();
        let owner = Uuid::new_v4();

        let registered = directory
            .register(&owner_ctx(owner), RegisterRequest::new("UID-123"))
            .await
            .unwrap();

        let stranger = owner_ctx(Uuid::new_v4());
        let err = directory
            .revoke(&stranger, RevokeRequest::new(registered.tag.id))
            .await
            .unwrap_err();
        assert_eq!(err.outcome_code(), "TAG_NOT_FOUND");

        let current = world.tag_by_uid("UID-123").unwrap();
        assert_eq!(current.status, TagStatus::Active);
    }

    #[tokio::test]
    async fn privileged_actors_may_revoke_any_tag() {
        let world = TestWorld::new();
        let directory = world.tag_directory();

        let registered = directory
            .register(&owner_ctx(Uuid::new_v4()), RegisterRequest::new("UID-123"))
            .await
            .unwrap();

        let admin = RequestContext::privileged(Uuid::new_v4(), "10.0.0.1".parse().unwrap());
        let revoked = directory
            .revoke(&admin, RevokeRequest::new(registered.tag.id))
            .await
            .unwrap();
        assert_eq!(revoked.status, TagStatus::Revoked);
    }

    #[tokio::test]
    async fn owners_see_their_tags_and_logs_admins_see_everything() {
        let world = TestWorld::new();
        let directory = world.tag_directory();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        directory
            .register(&owner_ctx(alice), RegisterRequest::new("UID-A"))
            .await
            .unwrap();
        directory
            .register(&owner_ctx(bob), RegisterRequest::new("UID-B"))
            .await
            .unwrap();

        let mine = directory.list_tags(&owner_ctx(alice)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].tag_uid.as_str(), "UID-A");

        let own_logs = directory
            .list_access_logs(&owner_ctx(alice), AccessLogFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(own_logs.items.len(), 1);

        let admin = RequestContext::privileged(Uuid::new_v4(), "10.0.0.1".parse().unwrap());
        let all_logs = directory
            .list_access_logs(&admin, AccessLogFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all_logs.items.len(), 2);
    }
}
