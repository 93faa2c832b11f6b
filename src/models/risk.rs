use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-patient risk score in [0, 10], with the weighted per-vital
/// contributions that produced it.
///
/// Absence of a score is expressed as `Option<RiskScore>` at the call
/// sites: a patient with no samples in the lookback window has no score,
/// which is distinct from a score of 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub patient_id: Uuid,
    pub score: f64,
    pub as_of: NaiveDateTime,
    pub breakdown: RiskBreakdown,
}

/// Weighted contribution of each vital to the score. `None` means the
/// vital was absent from every sample in the lookback window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub heart_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub spo2: Option<f64>,
}
