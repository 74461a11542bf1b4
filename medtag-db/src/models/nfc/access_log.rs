use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::identifiable::Identifiable;

/// Kind of credential operation being logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_type", rename_all = "PascalCase")]
pub enum AccessType {
    Scan,
    Register,
    Revoke,
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessType::Scan => write!(f, "Scan"),
            AccessType::Register => write!(f, "Register"),
            AccessType::Revoke => write!(f, "Revoke"),
        }
    }
}

impl FromStr for AccessType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scan" => Ok(AccessType::Scan),
            "Register" => Ok(AccessType::Register),
            "Revoke" => Ok(AccessType::Revoke),
            _ => Err(()),
        }
    }
}

/// Outcome of a logged attempt. `Denied` is a policy decision (privacy
/// opt-out, unusable tag); `Failed` is everything else that went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_outcome", rename_all = "PascalCase")]
pub enum AccessOutcome {
    Success,
    Failed,
    Denied,
}

impl std::fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessOutcome::Success => write!(f, "Success"),
            AccessOutcome::Failed => write!(f, "Failed"),
            AccessOutcome::Denied => write!(f, "Denied"),
        }
    }
}

impl FromStr for AccessOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(AccessOutcome::Success),
            "Failed" => Ok(AccessOutcome::Failed),
            "Denied" => Ok(AccessOutcome::Denied),
            _ => Err(()),
        }
    }
}

/// Immutable record of one credential operation attempt
///
/// Exactly one row is written per protocol entry, whatever the exit path.
/// `nfc_tag_id` is null when the tag could not be resolved; `accessed_by` is
/// null for anonymous scans. Rows reference users and tags by id only —
/// deleting either nulls the reference, historical rows are never removed.
///
/// `entry_hash` is the XxHash64 of the row with the hash field zeroed;
/// `antecedent_hash` is the `entry_hash` of the previous row for the same
/// credential (0 at the head of a chain and for rows with no resolved
/// credential). Recomputing the chain detects after-the-fact edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogModel {
    pub id: Uuid,

    pub nfc_tag_id: Option<Uuid>,
    pub accessed_by: Option<Uuid>,

    pub access_type: AccessType,
    pub outcome: AccessOutcome,

    pub ip_address: HeaplessString<45>,
    pub user_agent: Option<HeaplessString<500>>,
    pub device_info: Option<HeaplessString<255>>,

    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,

    pub error_message: Option<String>,

    pub accessed_at: DateTime<Utc>,

    /// Hash carried over from the previous entry of the same credential
    pub antecedent_hash: i64,

    /// Hash of this entry with this field set to 0
    pub entry_hash: i64,
}

impl AccessLogModel {
    /// Hash of the row contents with `entry_hash` zeroed.
    pub fn compute_hash(&self) -> Result<i64, String> {
        let mut detached = self.clone();
        detached.entry_hash = 0;
        crate::utils::hash_as_i64(&detached)
    }

    /// Verifies hashes and links over a slice ordered oldest first.
    ///
    /// Entries must belong to the same credential chain; the head's
    /// antecedent is not checked so a suffix of a chain also verifies.
    pub fn verify_chain(entries: &[AccessLogModel]) -> bool {
        for (i, entry) in entries.iter().enumerate() {
            match entry.compute_hash() {
                Ok(hash) if hash == entry.entry_hash => {}
                _ => return false,
            }
            if i > 0 && entry.antecedent_hash != entries[i - 1].entry_hash {
                return false;
            }
        }
        true
    }
}

impl Identifiable for AccessLogModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}
