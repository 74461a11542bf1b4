use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::identifiable::Identifiable;

/// Open enumeration of anomaly kinds; detection heuristics live outside the
/// monitor, `Other` absorbs what they invent next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "security_event_kind", rename_all = "PascalCase")]
pub enum SecurityEventKind {
    FailedLogin,
    MultipleFailedLogins,
    SuspiciousIp,
    RateLimitExceeded,
    InvalidToken,
    UnauthorizedAccess,
    BruteForceAttempt,
    SqlInjectionAttempt,
    XssAttempt,
    Other,
}

impl std::fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityEventKind::FailedLogin => "FailedLogin",
            SecurityEventKind::MultipleFailedLogins => "MultipleFailedLogins",
            SecurityEventKind::SuspiciousIp => "SuspiciousIp",
            SecurityEventKind::RateLimitExceeded => "RateLimitExceeded",
            SecurityEventKind::InvalidToken => "InvalidToken",
            SecurityEventKind::UnauthorizedAccess => "UnauthorizedAccess",
            SecurityEventKind::BruteForceAttempt => "BruteForceAttempt",
            SecurityEventKind::SqlInjectionAttempt => "SqlInjectionAttempt",
            SecurityEventKind::XssAttempt => "XssAttempt",
            SecurityEventKind::Other => "Other",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SecurityEventKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FailedLogin" => Ok(SecurityEventKind::FailedLogin),
            "MultipleFailedLogins" => Ok(SecurityEventKind::MultipleFailedLogins),
            "SuspiciousIp" => Ok(SecurityEventKind::SuspiciousIp),
            "RateLimitExceeded" => Ok(SecurityEventKind::RateLimitExceeded),
            "InvalidToken" => Ok(SecurityEventKind::InvalidToken),
            "UnauthorizedAccess" => Ok(SecurityEventKind::UnauthorizedAccess),
            "BruteForceAttempt" => Ok(SecurityEventKind::BruteForceAttempt),
            "SqlInjectionAttempt" => Ok(SecurityEventKind::SqlInjectionAttempt),
            "XssAttempt" => Ok(SecurityEventKind::XssAttempt),
            "Other" => Ok(SecurityEventKind::Other),
            _ => Err(()),
        }
    }
}

/// Severity scale for security events
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "security_severity", rename_all = "PascalCase")]
pub enum SecuritySeverity {
    Info,
    Warning,
    Danger,
    Critical,
}

impl std::fmt::Display for SecuritySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecuritySeverity::Info => "Info",
            SecuritySeverity::Warning => "Warning",
            SecuritySeverity::Danger => "Danger",
            SecuritySeverity::Critical => "Critical",
        };
        write!(f, "{s}")
    }
}

/// Security event row
///
/// Write-once except for the resolution dimension: `is_resolved`,
/// `resolved_at` and `action_taken` are set exactly once by the resolution
/// workflow; resolving an already-resolved event changes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEventModel {
    pub id: Uuid,

    pub event_type: SecurityEventKind,
    pub severity: SecuritySeverity,

    pub user_id: Option<Uuid>,

    pub ip_address: HeaplessString<45>,
    pub user_agent: Option<HeaplessString<500>>,
    pub endpoint: Option<HeaplessString<255>>,

    pub description: String,
    pub additional_data: Option<serde_json::Value>,

    pub action_taken: Option<String>,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl SecurityEventModel {
    pub fn is_open(&self) -> bool {
        !self.is_resolved
    }
}

impl Identifiable for SecurityEventModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}
