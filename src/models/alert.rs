use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AlertState, RuleId, Severity};

/// A persisted clinical alert with its supervised lifecycle fields.
///
/// At most one alert in an active state (`open`/`escalated`) exists per
/// (patient, rule) pair. Transition audit fields are set exactly once,
/// when the corresponding transition occurs, and never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub rule: RuleId,
    pub severity: Severity,
    pub state: AlertState,
    pub message: String,
    /// The sample that (most recently) triggered this alert. Refreshed
    /// when a new candidate is absorbed into an active alert.
    pub sample_id: Uuid,
    pub created_at: NaiveDateTime,
    pub escalated_at: Option<NaiveDateTime>,
    pub escalated_by: Option<Uuid>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub reviewed_by: Option<Uuid>,
    pub closed_at: Option<NaiveDateTime>,
    pub closed_by: Option<Uuid>,
}

/// Filter for alert queries. `role` drives the visibility policy:
/// doctors see only escalated-and-later alerts, nurses see all states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertFilter {
    pub patient_id: Option<Uuid>,
    pub role: super::enums::Role,
    pub state: Option<AlertState>,
}
