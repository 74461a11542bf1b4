//! In-memory collaborators for service tests: repositories backed by
//! mutexed vectors, a scriptable profile gateway and a recording alert sink.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use medtag_api::{
    EmergencyProfileGateway, OpsAlert, ProfileFetchError, ProfileSnapshot, ScanRequest,
};
use medtag_db::models::audit::{AuditEventModel, SecurityEventModel};
use medtag_db::models::nfc::{AccessLogModel, EmergencyAccessModel, NfcTagModel, TagStatus};
use medtag_db::repository::{
    AccessLogFilter, AccessLogRepository, AuditEventFilter, AuditEventRepository,
    EmergencyAccessRepository, Page, PageRequest, SecurityEventFilter, SecurityEventRepository,
    StoreError, StoreResult, TagRepository,
};

use crate::audit::AuditTrail;
use crate::checksum::ChecksumEngine;
use crate::config::CoreConfig;
use crate::scan::ScanProtocol;
use crate::security::{SecurityEventMonitor, SlidingWindowPolicy};
use crate::tags::TagDirectory;

pub fn test_config() -> CoreConfig {
    CoreConfig::new(b"unit-test-checksum-key-0123456789".to_vec()).unwrap()
}

pub fn active_tag(tag_uid: &str) -> NfcTagModel {
    let now = Utc::now();
    NfcTagModel {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        tag_uid: heapless::String::try_from(tag_uid).unwrap(),
        tag_type: heapless::String::try_from("NTAG215").unwrap(),
        public_key_id: heapless::String::try_from(Uuid::new_v4().to_string().as_str()).unwrap(),
        checksum: heapless::String::try_from("0".repeat(64).as_str()).unwrap(),
        status: TagStatus::Active,
        scan_count: 0,
        registered_at: now,
        last_scanned_at: None,
        revoked_at: None,
        revoked_reason: None,
        created_at: now,
        updated_at: now,
    }
}

fn page_of<T: Clone>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len();
    let items = items
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();
    Page::new(items, total, page)
}

// ---------------------------------------------------------------------------
// Tag repository

#[derive(Default)]
pub struct InMemoryTagRepository {
    tags: Mutex<Vec<NfcTagModel>>,
}

impl InMemoryTagRepository {
    pub fn insert(&self, tag: NfcTagModel) {
        self.tags.lock().unwrap().push(tag);
    }

    pub fn get_by_uid(&self, tag_uid: &str) -> Option<NfcTagModel> {
        self.tags
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.tag_uid.as_str() == tag_uid)
            .cloned()
    }

    pub fn set_status(&self, tag_uid: &str, status: TagStatus) {
        let mut tags = self.tags.lock().unwrap();
        if let Some(tag) = tags.iter_mut().find(|t| t.tag_uid.as_str() == tag_uid) {
            tag.status = status;
            if status == TagStatus::Revoked {
                tag.revoked_at = Some(Utc::now());
            }
        }
    }

    pub fn ids_owned_by(&self, user_id: Uuid) -> HashSet<Uuid> {
        self.tags
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.id)
            .collect()
    }
}

#[async_trait]
impl TagRepository for InMemoryTagRepository {
    async fn create(&self, tag: NfcTagModel) -> StoreResult<NfcTagModel> {
        let mut tags = self.tags.lock().unwrap();
        if tags.iter().any(|t| t.tag_uid == tag.tag_uid) {
            return Err(StoreError::Duplicate("tag_uid"));
        }
        if tags.iter().any(|t| t.public_key_id == tag.public_key_id) {
            return Err(StoreError::Duplicate("public_key_id"));
        }
        tags.push(tag.clone());
        Ok(tag)
    }

    async fn find_by_uid(&self, tag_uid: &str) -> StoreResult<Option<NfcTagModel>> {
        Ok(self.get_by_uid(tag_uid))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<NfcTagModel>> {
        Ok(self.tags.lock().unwrap().iter().find(|t| t.id == id).cloned())
    }

    async fn record_scan(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tags = self.tags.lock().unwrap();
        match tags.iter_mut().find(|t| t.id == id && t.is_active()) {
            Some(tag) => {
                tag.scan_count += 1;
                tag.last_scanned_at = Some(at);
                tag.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> StoreResult<bool> {
        let mut tags = self.tags.lock().unwrap();
        match tags.iter_mut().find(|t| t.id == id && t.is_active()) {
            Some(tag) => {
                tag.status = TagStatus::Revoked;
                tag.revoked_at = Some(at);
                tag.revoked_reason = reason.map(|r| r.to_string());
                tag.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<NfcTagModel>> {
        let mut owned: Vec<_> = self
            .tags
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.reverse();
        Ok(owned)
    }
}

// ---------------------------------------------------------------------------
// Access log repository

pub struct InMemoryAccessLogRepository {
    tags: Arc<InMemoryTagRepository>,
    entries: Mutex<Vec<AccessLogModel>>,
}

impl InMemoryAccessLogRepository {
    pub fn new(tags: Arc<InMemoryTagRepository>) -> Self {
        Self {
            tags,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn all(&self) -> Vec<AccessLogModel> {
        self.entries.lock().unwrap().clone()
    }

    pub fn chain(&self, nfc_tag_id: Uuid) -> Vec<AccessLogModel> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.nfc_tag_id == Some(nfc_tag_id))
            .cloned()
            .collect()
    }
}

fn matches_access_filter(entry: &AccessLogModel, filter: &AccessLogFilter) -> bool {
    filter.nfc_tag_id.map_or(true, |id| entry.nfc_tag_id == Some(id))
        && filter.access_type.map_or(true, |t| entry.access_type == t)
        && filter.outcome.map_or(true, |o| entry.outcome == o)
        && filter
            .ip_address
            .as_deref()
            .map_or(true, |ip| entry.ip_address.as_str() == ip)
}

#[async_trait]
impl AccessLogRepository for InMemoryAccessLogRepository {
    async fn append(&self, mut entry: AccessLogModel) -> StoreResult<AccessLogModel> {
        let mut entries = self.entries.lock().unwrap();
        entry.antecedent_hash = match entry.nfc_tag_id {
            Some(tag_id) => entries
                .iter()
                .rev()
                .find(|e| e.nfc_tag_id == Some(tag_id))
                .map(|e| e.entry_hash)
                .unwrap_or(0),
            None => 0,
        };
        entry.entry_hash = entry
            .compute_hash()
            .map_err(|e| StoreError::Backend(e.into()))?;
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list(
        &self,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>> {
        let matching: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| matches_access_filter(e, filter))
            .cloned()
            .collect();
        Ok(page_of(matching, page))
    }

    async fn list_for_owner(
        &self,
        user_id: Uuid,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>> {
        let owned = self.tags.ids_owned_by(user_id);
        let matching: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| {
                e.nfc_tag_id.is_some_and(|id| owned.contains(&id))
                    && matches_access_filter(e, filter)
            })
            .cloned()
            .collect();
        Ok(page_of(matching, page))
    }

    async fn chain_for_tag(&self, nfc_tag_id: Uuid) -> StoreResult<Vec<AccessLogModel>> {
        Ok(self.chain(nfc_tag_id))
    }
}

pub struct FailingAccessLogRepository;

#[async_trait]
impl AccessLogRepository for FailingAccessLogRepository {
    async fn append(&self, _entry: AccessLogModel) -> StoreResult<AccessLogModel> {
        Err(StoreError::Backend("injected access-log failure".into()))
    }

    async fn list(
        &self,
        _filter: &AccessLogFilter,
        _page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>> {
        Err(StoreError::Backend("injected access-log failure".into()))
    }

    async fn list_for_owner(
        &self,
        _user_id: Uuid,
        _filter: &AccessLogFilter,
        _page: PageRequest,
    ) -> StoreResult<Page<AccessLogModel>> {
        Err(StoreError::Backend("injected access-log failure".into()))
    }

    async fn chain_for_tag(&self, _nfc_tag_id: Uuid) -> StoreResult<Vec<AccessLogModel>> {
        Err(StoreError::Backend("injected access-log failure".into()))
    }
}

// ---------------------------------------------------------------------------
// Emergency access repository

pub struct InMemoryEmergencyAccessRepository {
    tags: Arc<InMemoryTagRepository>,
    records: Mutex<Vec<EmergencyAccessModel>>,
}

impl InMemoryEmergencyAccessRepository {
    pub fn new(tags: Arc<InMemoryTagRepository>) -> Self {
        Self {
            tags,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn all(&self) -> Vec<EmergencyAccessModel> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmergencyAccessRepository for InMemoryEmergencyAccessRepository {
    async fn append(&self, record: EmergencyAccessModel) -> StoreResult<EmergencyAccessModel> {
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list(&self, page: PageRequest) -> StoreResult<Page<EmergencyAccessModel>> {
        let records: Vec<_> = self.records.lock().unwrap().iter().rev().cloned().collect();
        Ok(page_of(records, page))
    }

    async fn list_for_owner(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<EmergencyAccessModel>> {
        let owned = self.tags.ids_owned_by(user_id);
        let records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| owned.contains(&r.nfc_tag_id))
            .cloned()
            .collect();
        Ok(page_of(records, page))
    }
}

// ---------------------------------------------------------------------------
// Audit event repository

#[derive(Default)]
pub struct InMemoryAuditEventRepository {
    events: Mutex<Vec<AuditEventModel>>,
}

impl InMemoryAuditEventRepository {
    pub fn all(&self) -> Vec<AuditEventModel> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditEventRepository for InMemoryAuditEventRepository {
    async fn append(&self, event: AuditEventModel) -> StoreResult<AuditEventModel> {
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn list(
        &self,
        filter: &AuditEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<AuditEventModel>> {
        let matching: Vec<_> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| {
                filter.actor_id.map_or(true, |a| e.actor_id == Some(a))
                    && filter.action.map_or(true, |x| e.action == x)
                    && filter.resource_type.map_or(true, |r| e.resource_type == r)
                    && filter.severity.map_or(true, |s| e.severity == s)
                    && filter.success.map_or(true, |s| e.success == s)
            })
            .cloned()
            .collect();
        Ok(page_of(matching, page))
    }
}

pub struct FailingAuditEventRepository;

#[async_trait]
impl AuditEventRepository for FailingAuditEventRepository {
    async fn append(&self, _event: AuditEventModel) -> StoreResult<AuditEventModel> {
        Err(StoreError::Backend("injected audit failure".into()))
    }

    async fn list(
        &self,
        _filter: &AuditEventFilter,
        _page: PageRequest,
    ) -> StoreResult<Page<AuditEventModel>> {
        Err(StoreError::Backend("injected audit failure".into()))
    }
}

// ---------------------------------------------------------------------------
// Security event repository

#[derive(Default)]
pub struct InMemorySecurityEventRepository {
    events: Mutex<Vec<SecurityEventModel>>,
}

impl InMemorySecurityEventRepository {
    pub fn all(&self) -> Vec<SecurityEventModel> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecurityEventRepository for InMemorySecurityEventRepository {
    async fn append(&self, event: SecurityEventModel) -> StoreResult<SecurityEventModel> {
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<SecurityEventModel>> {
        Ok(self.events.lock().unwrap().iter().find(|e| e.id == id).cloned())
    }

    async fn mark_resolved(
        &self,
        id: Uuid,
        action_taken: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut events = self.events.lock().unwrap();
        match events.iter_mut().find(|e| e.id == id && !e.is_resolved) {
            Some(event) => {
                event.is_resolved = true;
                event.resolved_at = Some(at);
                event.action_taken = Some(action_taken.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(
        &self,
        filter: &SecurityEventFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SecurityEventModel>> {
        let matching: Vec<_> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| {
                filter.event_type.map_or(true, |t| e.event_type == t)
                    && filter.severity.map_or(true, |s| e.severity == s)
                    && filter.is_resolved.map_or(true, |r| e.is_resolved == r)
                    && filter
                        .ip_address
                        .as_deref()
                        .map_or(true, |ip| e.ip_address.as_str() == ip)
                    && filter.user_id.map_or(true, |u| e.user_id == Some(u))
            })
            .cloned()
            .collect();
        Ok(page_of(matching, page))
    }
}

// ---------------------------------------------------------------------------
// Gateway and alerts

pub struct StaticGateway {
    result: Mutex<Result<ProfileSnapshot, ProfileFetchError>>,
    delay: Mutex<Option<Duration>>,
}

impl Default for StaticGateway {
    fn default() -> Self {
        let mut snapshot = ProfileSnapshot::empty();
        snapshot.blood_type = Some("II+".to_string());
        snapshot.emergency_notes = Some("diabetic, insulin in backpack".to_string());
        Self {
            result: Mutex::new(Ok(snapshot)),
            delay: Mutex::new(None),
        }
    }
}

impl StaticGateway {
    pub fn set_result(&self, result: Result<ProfileSnapshot, ProfileFetchError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn set_blood_type(&self, blood_type: &str) {
        if let Ok(snapshot) = self.result.lock().unwrap().as_mut() {
            snapshot.blood_type = Some(blood_type.to_string());
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl EmergencyProfileGateway for StaticGateway {
    async fn fetch(&self, _user_id: Uuid) -> Result<ProfileSnapshot, ProfileFetchError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.result.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    notes: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingAlerts {
    pub fn notes(&self) -> Vec<(&'static str, String)> {
        self.notes.lock().unwrap().clone()
    }
}

impl OpsAlert for RecordingAlerts {
    fn notify(&self, subsystem: &'static str, detail: &str) {
        self.notes.lock().unwrap().push((subsystem, detail.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Wired-up world

pub struct TagFixture {
    pub tag_uid: String,
    pub public_key_id: String,
    pub checksum: String,
}

impl TagFixture {
    pub fn scan_request(&self) -> ScanRequest {
        ScanRequest::new(
            self.tag_uid.clone(),
            self.public_key_id.clone(),
            self.checksum.clone(),
        )
    }
}

pub struct TestWorld {
    pub config: CoreConfig,
    pub tags: Arc<InMemoryTagRepository>,
    pub access_logs: Arc<InMemoryAccessLogRepository>,
    pub emergency_accesses: Arc<InMemoryEmergencyAccessRepository>,
    pub audit_events: Arc<InMemoryAuditEventRepository>,
    pub security_events: Arc<InMemorySecurityEventRepository>,
    pub gateway: Arc<StaticGateway>,
    pub alerts: Arc<RecordingAlerts>,
    pub checksum: Arc<ChecksumEngine>,
    integrity_policy: Arc<SlidingWindowPolicy>,
    failing_access_logs: bool,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_integrity_threshold(threshold: u32) -> Self {
        Self::with_config(
            test_config().with_integrity_thresholds(threshold, Duration::from_secs(300)),
        )
    }

    fn with_config(config: CoreConfig) -> Self {
        let tags = Arc::new(InMemoryTagRepository::default());
        let checksum = Arc::new(ChecksumEngine::new(&config));
        let integrity_policy = Arc::new(SlidingWindowPolicy::new(&config));
        Self {
            tags: tags.clone(),
            access_logs: Arc::new(InMemoryAccessLogRepository::new(tags.clone())),
            emergency_accesses: Arc::new(InMemoryEmergencyAccessRepository::new(tags)),
            audit_events: Arc::new(InMemoryAuditEventRepository::default()),
            security_events: Arc::new(InMemorySecurityEventRepository::default()),
            gateway: Arc::new(StaticGateway::default()),
            alerts: Arc::new(RecordingAlerts::default()),
            checksum,
            integrity_policy,
            failing_access_logs: false,
            config,
        }
    }

    pub fn with_failing_access_logs(mut self) -> Self {
        self.failing_access_logs = true;
        self
    }

    fn access_log_repo(&self) -> Arc<dyn AccessLogRepository> {
        if self.failing_access_logs {
            Arc::new(FailingAccessLogRepository)
        } else {
            self.access_logs.clone()
        }
    }

    fn audit_trail(&self) -> Arc<AuditTrail> {
        Arc::new(AuditTrail::new(
            &self.config,
            self.audit_events.clone(),
            self.alerts.clone(),
        ))
    }

    pub fn scan_protocol(&self) -> ScanProtocol {
        ScanProtocol::new(
            &self.config,
            self.tags.clone(),
            self.access_log_repo(),
            self.emergency_accesses.clone(),
            self.gateway.clone(),
            self.checksum.clone(),
            Arc::new(SecurityEventMonitor::new(
                self.security_events.clone(),
                self.alerts.clone(),
            )),
            self.integrity_policy.clone(),
            self.audit_trail(),
            self.alerts.clone(),
        )
    }

    pub fn tag_directory(&self) -> TagDirectory {
        TagDirectory::new(
            self.tags.clone(),
            self.access_log_repo(),
            self.emergency_accesses.clone(),
            self.checksum.clone(),
            self.audit_trail(),
            self.alerts.clone(),
        )
    }

    /// Seed a registered Active tag directly in the store, returning the
    /// identifiers a reader would present.
    pub fn register_active_tag(&self, tag_uid: &str) -> TagFixture {
        let mut tag = active_tag(tag_uid);
        let public_key_id = tag.public_key_id.as_str().to_string();
        let checksum = self.checksum.generate(tag_uid, &public_key_id);
        tag.checksum = heapless::String::try_from(checksum.as_str()).unwrap();
        self.tags.insert(tag);
        TagFixture {
            tag_uid: tag_uid.to_string(),
            public_key_id,
            checksum,
        }
    }

    pub fn tag_by_uid(&self, tag_uid: &str) -> Option<NfcTagModel> {
        self.tags.get_by_uid(tag_uid)
    }

    pub fn revoke_tag(&self, tag_uid: &str) {
        self.tags.set_status(tag_uid, TagStatus::Revoked);
    }
}
