use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::geo::GeoPoint;
use crate::error::{TagError, TagResult};

/// Registration input. The physical UID comes from the tag itself; everything
/// else is generated server side.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub tag_uid: String,

    #[validate(length(min = 1, max = 50))]
    pub tag_type: String,
}

impl RegisterRequest {
    pub fn new(tag_uid: impl Into<String>) -> Self {
        Self {
            tag_uid: tag_uid.into(),
            tag_type: "NTAG215".to_string(),
        }
    }

    pub fn with_tag_type(mut self, tag_type: impl Into<String>) -> Self {
        self.tag_type = tag_type.into();
        self
    }
}

/// Scan input as presented by an unauthenticated reader.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 100))]
    pub tag_uid: String,

    #[validate(length(min = 1, max = 100))]
    pub public_key_id: String,

    #[validate(length(equal = 64))]
    pub checksum: String,

    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

impl ScanRequest {
    pub fn new(
        tag_uid: impl Into<String>,
        public_key_id: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            tag_uid: tag_uid.into(),
            public_key_id: public_key_id.into(),
            checksum: checksum.into(),
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_location(mut self, point: GeoPoint) -> Self {
        self.latitude = Some(point.latitude);
        self.longitude = Some(point.longitude);
        self
    }

    /// Both coordinates or neither; a lone latitude is a malformed request.
    pub fn location(&self) -> TagResult<Option<GeoPoint>> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => GeoPoint::new(latitude, longitude).map(Some),
            (None, None) => Ok(None),
            _ => Err(TagError::Validation(
                "latitude and longitude must be provided together".to_string(),
            )),
        }
    }
}

/// Revocation input.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RevokeRequest {
    pub tag_id: Uuid,

    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

impl RevokeRequest {
    pub fn new(tag_id: Uuid) -> Self {
        Self { tag_id, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Convert validator output into the boundary error type.
pub fn check_valid<T: Validate>(input: &T) -> TagResult<()> {
    input
        .validate()
        .map_err(|e| TagError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn scan_request_requires_a_full_checksum() {
        let request = ScanRequest::new("UID-123", "pk-1", "short");
        assert!(check_valid(&request).is_err());

        let request = ScanRequest::new("UID-123", "pk-1", "a".repeat(64));
        assert!(check_valid(&request).is_ok());
    }

    #[test]
    fn empty_tag_uid_is_rejected() {
        let request = RegisterRequest::new("");
        assert!(check_valid(&request).is_err());
    }

    #[test]
    fn lone_latitude_is_rejected() {
        let mut request = ScanRequest::new("UID-123", "pk-1", "a".repeat(64));
        request.latitude = Some(Decimal::from_str("55.751244").unwrap());
        assert!(request.location().is_err());
    }

    #[test]
    fn paired_coordinates_resolve_to_a_point() {
        let point = GeoPoint::new(
            Decimal::from_str("55.751244").unwrap(),
            Decimal::from_str("37.618423").unwrap(),
        )
        .unwrap();
        let request = ScanRequest::new("UID-123", "pk-1", "a".repeat(64)).with_location(point);
        assert_eq!(request.location().unwrap(), Some(point));
    }
}
