use medtag_api::{TagError, TagResult};
use medtag_db::models::nfc::{NfcTagModel, TagStatus};

/// Usability gate for the scan protocol and every mutating operation.
///
/// The error names the current status so a reader client can tell the holder
/// why the tag stopped working.
pub fn ensure_usable(tag: &NfcTagModel) -> TagResult<()> {
    if tag.is_active() {
        Ok(())
    } else {
        Err(TagError::TagNotUsable {
            status: tag.status.to_string(),
        })
    }
}

/// Guard for explicit state changes. Terminal states have no way out.
pub fn ensure_transition(from: TagStatus, to: TagStatus) -> TagResult<()> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(TagError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::active_tag;

    #[test]
    fn active_tags_are_usable() {
        let tag = active_tag("UID-123");
        assert!(ensure_usable(&tag).is_ok());
    }

    #[test]
    fn revoked_tags_report_their_status() {
        let mut tag = active_tag("UID-123");
        tag.status = TagStatus::Revoked;
        let err = ensure_usable(&tag).unwrap_err();
        assert_eq!(err.outcome_code(), "TAG_NOT_USABLE");
        assert!(err.to_string().contains("Revoked"));
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        for from in [TagStatus::Revoked, TagStatus::Lost, TagStatus::Replaced] {
            for to in [
                TagStatus::Active,
                TagStatus::Revoked,
                TagStatus::Lost,
                TagStatus::Replaced,
            ] {
                let err = ensure_transition(from, to).unwrap_err();
                assert_eq!(err.outcome_code(), "INVALID_TRANSITION");
            }
        }
    }

    #[test]
    fn active_reaches_every_terminal_state() {
        for to in [TagStatus::Revoked, TagStatus::Lost, TagStatus::Replaced] {
            assert!(ensure_transition(TagStatus::Active, to).is_ok());
        }
    }
}
