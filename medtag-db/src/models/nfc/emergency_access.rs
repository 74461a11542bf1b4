use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::identifiable::Identifiable;

/// Immutable snapshot of one successful emergency disclosure
///
/// Written only when a scan reaches outcome `Success`. `data_accessed` is a
/// detached copy of the profile payload as returned at scan time; later
/// profile edits never change it. `accessed_by` is null when the scanning
/// party was anonymous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyAccessModel {
    pub id: Uuid,

    pub nfc_tag_id: Uuid,
    pub accessed_by: Option<Uuid>,

    pub accessed_at: DateTime<Utc>,

    pub ip_address: HeaplessString<45>,
    pub device_info: Option<HeaplessString<255>>,

    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,

    /// Verbatim copy of the disclosed profile payload
    pub data_accessed: serde_json::Value,

    pub access_notes: Option<String>,
}

impl Identifiable for EmergencyAccessModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}
