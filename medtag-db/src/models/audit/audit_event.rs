use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::identifiable::Identifiable;

/// Audited action kinds, covering credential operations and the account
/// actions recorded around them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "PascalCase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Read,
    Login,
    Logout,
    Register,
    PasswordChange,
    TwoFactorEnable,
    TwoFactorDisable,
    NfcRegister,
    NfcScan,
    NfcRevoke,
    EmergencyAccess,
    Other,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Create => "Create",
            AuditAction::Update => "Update",
            AuditAction::Delete => "Delete",
            AuditAction::Read => "Read",
            AuditAction::Login => "Login",
            AuditAction::Logout => "Logout",
            AuditAction::Register => "Register",
            AuditAction::PasswordChange => "PasswordChange",
            AuditAction::TwoFactorEnable => "TwoFactorEnable",
            AuditAction::TwoFactorDisable => "TwoFactorDisable",
            AuditAction::NfcRegister => "NfcRegister",
            AuditAction::NfcScan => "NfcScan",
            AuditAction::NfcRevoke => "NfcRevoke",
            AuditAction::EmergencyAccess => "EmergencyAccess",
            AuditAction::Other => "Other",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AuditAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(AuditAction::Create),
            "Update" => Ok(AuditAction::Update),
            "Delete" => Ok(AuditAction::Delete),
            "Read" => Ok(AuditAction::Read),
            "Login" => Ok(AuditAction::Login),
            "Logout" => Ok(AuditAction::Logout),
            "Register" => Ok(AuditAction::Register),
            "PasswordChange" => Ok(AuditAction::PasswordChange),
            "TwoFactorEnable" => Ok(AuditAction::TwoFactorEnable),
            "TwoFactorDisable" => Ok(AuditAction::TwoFactorDisable),
            "NfcRegister" => Ok(AuditAction::NfcRegister),
            "NfcScan" => Ok(AuditAction::NfcScan),
            "NfcRevoke" => Ok(AuditAction::NfcRevoke),
            "EmergencyAccess" => Ok(AuditAction::EmergencyAccess),
            "Other" => Ok(AuditAction::Other),
            _ => Err(()),
        }
    }
}

/// Resource taxonomy for audit rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_kind", rename_all = "PascalCase")]
pub enum ResourceKind {
    User,
    Profile,
    Allergy,
    Disease,
    Medication,
    Contact,
    Note,
    NfcTag,
    System,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::User => "User",
            ResourceKind::Profile => "Profile",
            ResourceKind::Allergy => "Allergy",
            ResourceKind::Disease => "Disease",
            ResourceKind::Medication => "Medication",
            ResourceKind::Contact => "Contact",
            ResourceKind::Note => "Note",
            ResourceKind::NfcTag => "NfcTag",
            ResourceKind::System => "System",
        };
        write!(f, "{s}")
    }
}

/// Severity scale for audit rows
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "audit_severity", rename_all = "PascalCase")]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditSeverity::Low => "Low",
            AuditSeverity::Medium => "Medium",
            AuditSeverity::High => "High",
            AuditSeverity::Critical => "Critical",
        };
        write!(f, "{s}")
    }
}

/// Immutable audit row for any sensitive action
///
/// `old_value`/`new_value` are stored sanitized: sensitive keys are replaced
/// before the row reaches the store. Only a privileged role may delete rows,
/// and nothing updates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEventModel {
    pub id: Uuid,

    pub actor_id: Option<Uuid>,

    pub action: AuditAction,
    pub resource_type: ResourceKind,
    pub resource_id: Option<HeaplessString<255>>,
    pub resource_name: Option<HeaplessString<255>>,

    pub description: String,
    pub severity: AuditSeverity,

    pub ip_address: Option<HeaplessString<45>>,
    pub user_agent: Option<HeaplessString<500>>,
    pub endpoint: Option<HeaplessString<255>>,
    pub method: Option<HeaplessString<10>>,

    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,

    pub success: bool,
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Identifiable for AuditEventModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_supports_escalation() {
        assert!(AuditSeverity::Low < AuditSeverity::Medium);
        assert!(AuditSeverity::Medium < AuditSeverity::High);
        assert!(AuditSeverity::High < AuditSeverity::Critical);
    }

    #[test]
    fn action_round_trips_through_strings() {
        for action in [
            AuditAction::NfcRegister,
            AuditAction::NfcScan,
            AuditAction::NfcRevoke,
            AuditAction::EmergencyAccess,
        ] {
            assert_eq!(AuditAction::from_str(&action.to_string()), Ok(action));
        }
    }
}
