use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{TagError, TagResult};

/// Optional scan geolocation, decimal degrees with six fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GeoPoint {
    pub fn new(latitude: Decimal, longitude: Decimal) -> TagResult<Self> {
        if latitude < Decimal::from(-90) || latitude > Decimal::from(90) {
            return Err(TagError::Validation(format!(
                "latitude {latitude} out of range [-90, 90]"
            )));
        }
        if longitude < Decimal::from(-180) || longitude > Decimal::from(180) {
            return Err(TagError::Validation(format!(
                "longitude {longitude} out of range [-180, 180]"
            )));
        }
        Ok(Self { latitude, longitude })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn accepts_coordinates_in_range() {
        let point = GeoPoint::new(
            Decimal::from_str("55.751244").unwrap(),
            Decimal::from_str("37.618423").unwrap(),
        )
        .unwrap();
        assert_eq!(point.latitude, Decimal::from_str("55.751244").unwrap());
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        let err = GeoPoint::new(Decimal::from(91), Decimal::from(0)).unwrap_err();
        assert_eq!(err.outcome_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        let err = GeoPoint::new(Decimal::from(0), Decimal::from(-181)).unwrap_err();
        assert_eq!(err.outcome_code(), "VALIDATION_FAILED");
    }
}
