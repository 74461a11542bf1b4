use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::identifiable::Identifiable;
use crate::models::index::Index;
use crate::models::indexable::IndexAware;

/// Database model for tag status enum
///
/// `Active` is the only non-terminal state; everything else is final and has
/// no outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tag_status", rename_all = "PascalCase")]
pub enum TagStatus {
    Active,
    Revoked,
    Lost,
    Replaced,
}

impl TagStatus {
    pub fn is_terminal(self) -> bool {
        self != TagStatus::Active
    }

    /// Forward-only transition graph: Active may move to any terminal state,
    /// terminal states go nowhere.
    pub fn can_transition(self, to: TagStatus) -> bool {
        self == TagStatus::Active && to != TagStatus::Active
    }
}

impl std::fmt::Display for TagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagStatus::Active => write!(f, "Active"),
            TagStatus::Revoked => write!(f, "Revoked"),
            TagStatus::Lost => write!(f, "Lost"),
            TagStatus::Replaced => write!(f, "Replaced"),
        }
    }
}

impl FromStr for TagStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(TagStatus::Active),
            "Revoked" => Ok(TagStatus::Revoked),
            "Lost" => Ok(TagStatus::Lost),
            "Replaced" => Ok(TagStatus::Replaced),
            _ => Err(()),
        }
    }
}

/// Database model for a registered NFC tag
///
/// The tag is the bearer credential: `tag_uid` is the physical identifier
/// burned into the chip, `public_key_id` is minted at registration, and
/// `checksum` binds the two under the operator's HMAC key. `tag_uid` and
/// `public_key_id` stay unique for the lifetime of the system, including
/// after revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NfcTagModel {
    pub id: Uuid,

    /// Owning user account
    pub user_id: Uuid,

    /// Physical identifier read from the chip, case-sensitive
    pub tag_uid: HeaplessString<100>,

    /// Hardware family, e.g. `NTAG215`
    pub tag_type: HeaplessString<50>,

    /// Key identifier minted at registration, never reused
    pub public_key_id: HeaplessString<100>,

    /// Hex HMAC-SHA256 over `tag_uid ‖ public_key_id`, computed once at
    /// registration and never recomputed
    pub checksum: HeaplessString<64>,

    #[serde(
        serialize_with = "serialize_tag_status",
        deserialize_with = "deserialize_tag_status"
    )]
    pub status: TagStatus,

    /// Monotonically non-decreasing scan counter
    pub scan_count: i64,

    pub registered_at: DateTime<Utc>,
    pub last_scanned_at: Option<DateTime<Utc>>,

    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NfcTagModel {
    /// Usability predicate for the scan protocol.
    pub fn is_active(&self) -> bool {
        self.status == TagStatus::Active
    }
}

impl Identifiable for NfcTagModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Index model for NFC tags
///
/// Probed by hashed natural key; the main row is always re-checked for an
/// exact match because the hash is not collision free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagIdxModel {
    pub tag_id: Uuid,
    pub tag_uid_hash: i64,
    pub public_key_id_hash: i64,
    pub user_id: Uuid,
}

impl Identifiable for TagIdxModel {
    fn get_id(&self) -> Uuid {
        self.tag_id
    }
}

impl Index for TagIdxModel {}

impl IndexAware for NfcTagModel {
    type IndexType = TagIdxModel;

    fn to_index(&self) -> Self::IndexType {
        TagIdxModel {
            tag_id: self.id,
            tag_uid_hash: crate::utils::hash_as_i64(&self.tag_uid.as_str()).unwrap_or(0),
            public_key_id_hash: crate::utils::hash_as_i64(&self.public_key_id.as_str())
                .unwrap_or(0),
            user_id: self.user_id,
        }
    }
}

// Serialization functions for TagStatus
fn serialize_tag_status<S>(status: &TagStatus, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&status.to_string())
}

fn deserialize_tag_status<'de, D>(deserializer: D) -> Result<TagStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    TagStatus::from_str(&s)
        .map_err(|_| serde::de::Error::custom(format!("Unknown tag status: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        let all = [
            TagStatus::Active,
            TagStatus::Revoked,
            TagStatus::Lost,
            TagStatus::Replaced,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn active_transitions_to_every_terminal_state() {
        for to in [TagStatus::Revoked, TagStatus::Lost, TagStatus::Replaced] {
            assert!(TagStatus::Active.can_transition(to));
        }
        assert!(!TagStatus::Active.can_transition(TagStatus::Active));
    }

    #[test]
    fn index_hashes_follow_the_natural_keys() {
        let tag = NfcTagModel {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tag_uid: HeaplessString::try_from("UID-123").unwrap(),
            tag_type: HeaplessString::try_from("NTAG215").unwrap(),
            public_key_id: HeaplessString::try_from("pk-1").unwrap(),
            checksum: HeaplessString::try_from("00").unwrap(),
            status: TagStatus::Active,
            scan_count: 0,
            registered_at: Utc::now(),
            last_scanned_at: None,
            revoked_at: None,
            revoked_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let idx = tag.to_index();
        assert_eq!(idx.tag_id, tag.id);
        assert_eq!(
            idx.tag_uid_hash,
            crate::utils::hash_as_i64(&"UID-123").unwrap()
        );
        assert_eq!(idx.user_id, tag.user_id);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TagStatus::Active,
            TagStatus::Revoked,
            TagStatus::Lost,
            TagStatus::Replaced,
        ] {
            assert_eq!(TagStatus::from_str(&status.to_string()), Ok(status));
        }
        assert!(TagStatus::from_str("Broken").is_err());
    }
}
