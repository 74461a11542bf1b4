use thiserror::Error;

/// Failure taxonomy for credential operations.
///
/// Every variant maps to a stable outcome code via [`TagError::outcome_code`]
/// so that scanning clients (reader firmware, mobile apps) can branch on the
/// code instead of parsing messages.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tag not found")]
    TagNotFound,

    #[error("Tag is not usable: status is {status}")]
    TagNotUsable { status: String },

    #[error("Tag UID is already registered")]
    DuplicateTag,

    #[error("Tag has already been revoked")]
    AlreadyRevoked,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Integrity check failed")]
    IntegrityCheckFailed,

    #[error("Emergency access disabled by the profile owner")]
    PrivacyDenied,

    #[error("Medical profile not found")]
    ProfileNotFound,

    #[error("Record not found")]
    NotFound,

    #[error("Profile gateway timed out")]
    GatewayTimeout,

    #[error("Profile gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Operation not permitted")]
    Forbidden,

    #[error("Store error: {0}")]
    Store(String),
}

impl TagError {
    /// Stable, documented outcome code for client integrations.
    pub fn outcome_code(&self) -> &'static str {
        match self {
            TagError::Validation(_) => "VALIDATION_FAILED",
            TagError::TagNotFound => "TAG_NOT_FOUND",
            TagError::TagNotUsable { .. } => "TAG_NOT_USABLE",
            TagError::DuplicateTag => "DUPLICATE_TAG",
            TagError::AlreadyRevoked => "ALREADY_REVOKED",
            TagError::InvalidTransition { .. } => "INVALID_TRANSITION",
            TagError::IntegrityCheckFailed => "INTEGRITY_CHECK_FAILED",
            TagError::PrivacyDenied => "PRIVACY_DENIED",
            TagError::ProfileNotFound => "PROFILE_NOT_FOUND",
            TagError::NotFound => "NOT_FOUND",
            TagError::GatewayTimeout => "GATEWAY_TIMEOUT",
            TagError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            TagError::Forbidden => "FORBIDDEN",
            TagError::Store(_) => "STORE_ERROR",
        }
    }

    /// Wrap a backend failure, keeping only its display form.
    pub fn store(err: impl std::fmt::Display) -> Self {
        TagError::Store(err.to_string())
    }
}

pub type TagResult<T> = Result<T, TagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes_are_distinct() {
        let errors = [
            TagError::Validation("x".into()),
            TagError::TagNotFound,
            TagError::TagNotUsable { status: "Revoked".into() },
            TagError::DuplicateTag,
            TagError::AlreadyRevoked,
            TagError::InvalidTransition { from: "Revoked".into(), to: "Lost".into() },
            TagError::IntegrityCheckFailed,
            TagError::PrivacyDenied,
            TagError::ProfileNotFound,
            TagError::NotFound,
            TagError::GatewayTimeout,
            TagError::GatewayUnavailable("down".into()),
            TagError::Forbidden,
            TagError::Store("io".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.outcome_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn not_usable_message_names_the_status() {
        let err = TagError::TagNotUsable { status: "Revoked".into() };
        assert!(err.to_string().contains("Revoked"));
    }
}
