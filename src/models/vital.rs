use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VitalKind;

/// One immutable vital-sign measurement for a patient.
///
/// Each vital field is optional; a sample carries whatever the monitor
/// reported. Within one patient's series `recorded_at` is strictly
/// increasing — out-of-order submissions are rejected at ingest, never
/// reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalSample {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub recorded_at: NaiveDateTime,
    pub heart_rate: Option<i64>,
    pub temperature: Option<f64>,
    pub spo2: Option<f64>,
}

impl VitalSample {
    /// The value of one vital kind, as f64, if present.
    pub fn value(&self, kind: VitalKind) -> Option<f64> {
        match kind {
            VitalKind::HeartRate => self.heart_rate.map(|v| v as f64),
            VitalKind::Temperature => self.temperature,
            VitalKind::Spo2 => self.spo2,
        }
    }

    pub fn has_any_vital(&self) -> bool {
        self.heart_rate.is_some() || self.temperature.is_some() || self.spo2.is_some()
    }
}
