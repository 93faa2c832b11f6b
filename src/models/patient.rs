use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub room: Option<String>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Partial update of patient details. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub room: Option<String>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.sex.is_none()
            && self.room.is_none()
            && self.weight_kg.is_none()
            && self.notes.is_none()
    }
}
