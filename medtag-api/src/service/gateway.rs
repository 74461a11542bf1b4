use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::snapshot::ProfileSnapshot;

/// Tri-state outcome of a profile fetch. Privacy opt-out and absence are
/// distinct: the former is the owner's decision, the latter a data gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileFetchError {
    /// The owner disabled emergency access (`is_public = false`).
    NotPublic,
    /// No medical profile exists for this user.
    NotFound,
    /// The profile subsystem could not answer.
    Unavailable(String),
}

impl std::fmt::Display for ProfileFetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileFetchError::NotPublic => write!(f, "profile is not public"),
            ProfileFetchError::NotFound => write!(f, "profile not found"),
            ProfileFetchError::Unavailable(detail) => write!(f, "gateway unavailable: {detail}"),
        }
    }
}

impl std::error::Error for ProfileFetchError {}

/// Boundary to the medical-profile subsystem.
///
/// The core never inspects profile internals; it forwards the snapshot and
/// archives a detached copy. Implementations must already apply the
/// emergency-visibility filtering before returning.
#[async_trait]
pub trait EmergencyProfileGateway: Send + Sync {
    async fn fetch(&self, user_id: Uuid) -> Result<ProfileSnapshot, ProfileFetchError>;
}
