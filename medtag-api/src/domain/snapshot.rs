use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Allergy severity scale shown to first responders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllergySeverity {
    Mild,
    Moderate,
    Severe,
    LifeThreatening,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergyEntry {
    pub allergen: String,
    pub severity: AllergySeverity,
    pub reaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub name: String,
    pub icd_code: Option<String>,
    pub diagnosed_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub full_name: String,
    pub relationship: Option<String>,
    pub phone: String,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorNote {
    pub title: String,
    pub note: String,
}

/// Point-in-time, privacy-filtered copy of a person's emergency medical data.
///
/// The scan protocol treats this as opaque: it is returned to the caller and
/// persisted verbatim into the emergency-access record. Only active
/// conditions/medications and emergency-visible doctor notes belong here;
/// that filtering is the profile subsystem's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub blood_type: Option<String>,
    pub height_cm: Option<u32>,
    pub weight_kg: Option<rust_decimal::Decimal>,
    pub allergies: Vec<AllergyEntry>,
    pub chronic_conditions: Vec<ConditionEntry>,
    pub medications: Vec<MedicationEntry>,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub doctor_notes: Vec<DoctorNote>,
    pub emergency_notes: Option<String>,
}

impl ProfileSnapshot {
    /// An empty snapshot; useful as a builder seed and in tests.
    pub fn empty() -> Self {
        Self {
            blood_type: None,
            height_cm: None,
            weight_kg: None,
            allergies: Vec::new(),
            chronic_conditions: Vec::new(),
            medications: Vec::new(),
            emergency_contacts: Vec::new(),
            doctor_notes: Vec::new(),
            emergency_notes: None,
        }
    }

    /// Detached JSON copy for historical records. Later profile edits must
    /// never alter what was disclosed at scan time.
    pub fn to_detached_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_value_is_a_copy() {
        let mut snapshot = ProfileSnapshot::empty();
        snapshot.blood_type = Some("II+".to_string());
        let detached = snapshot.to_detached_value();

        snapshot.blood_type = Some("IV-".to_string());
        assert_eq!(detached["blood_type"], "II+");
    }

    #[test]
    fn severity_serializes_in_wire_case() {
        let json = serde_json::to_string(&AllergySeverity::LifeThreatening).unwrap();
        assert_eq!(json, "\"LIFE_THREATENING\"");
    }
}
