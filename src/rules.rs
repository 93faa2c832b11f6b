//! Rule evaluator — pure mapping from a recent sample window to alert
//! candidates.
//!
//! Each rule is independent and produces at most one candidate per
//! evaluation; the lifecycle engine decides how candidates are surfaced.
//! Evaluation has no side effects, so it can be re-run against historical
//! windows to reconstruct what would have fired.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RuleThresholds;
use crate::models::{RuleId, Severity, VitalSample};

/// An unpersisted indication that a rule's condition holds for a sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub patient_id: Uuid,
    pub rule: RuleId,
    pub severity: Severity,
    pub sample_id: Uuid,
    pub message: String,
}

/// Evaluate all rules against a patient's recent window, most-recent-first.
/// Only the latest sample is thresholded today; the window is passed so
/// trend-sensitive rules can join without changing the signature.
///
/// Missing vital fields make the corresponding rule not evaluable: no
/// candidate, no error.
pub fn evaluate(window: &[VitalSample], thresholds: &RuleThresholds) -> Vec<AlertCandidate> {
    let Some(sample) = window.first() else {
        return Vec::new();
    };

    let mut candidates = Vec::new();

    if let Some(spo2) = sample.spo2 {
        if spo2 < thresholds.spo2_critical {
            candidates.push(candidate(
                sample,
                RuleId::LowSpo2,
                Severity::Critical,
                format!("SpO₂ {spo2:.0}% — threshold exceeded"),
            ));
        }
    }

    if let Some(temp) = sample.temperature {
        if temp >= thresholds.temp_critical {
            candidates.push(candidate(
                sample,
                RuleId::HighTemp,
                Severity::Critical,
                format!("Temperature {temp:.1}°C — threshold exceeded"),
            ));
        } else if temp >= thresholds.temp_warning {
            candidates.push(candidate(
                sample,
                RuleId::HighTemp,
                Severity::Warning,
                format!("Temperature {temp:.1}°C — above normal"),
            ));
        }
    }

    if let Some(hr) = sample.heart_rate {
        if hr > thresholds.hr_warning {
            candidates.push(candidate(
                sample,
                RuleId::HighHeartRate,
                Severity::Warning,
                format!("Heart rate {hr} bpm — above normal range"),
            ));
        }
    }

    candidates
}

fn candidate(
    sample: &VitalSample,
    rule: RuleId,
    severity: Severity,
    message: String,
) -> AlertCandidate {
    AlertCandidate {
        patient_id: sample.patient_id,
        rule,
        severity,
        sample_id: sample.id,
        message,
    }
}
