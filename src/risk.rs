//! Risk scorer — bounded, explainable aggregation of a patient's recent
//! vitals, plus interval-averaged trend series for charting.
//!
//! Scoring is deterministic given the same sample window and weights, and
//! never invents an opinion: an empty window yields no score at all.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RiskWeights;
use crate::models::{RiskBreakdown, RiskScore, VitalKind, VitalSample};

/// Compute the risk score for one patient from the samples inside the
/// lookback window, most-recent-first.
///
/// Per vital: mean of the last `max_samples` in-window values (damping
/// single-sample noise), normalized deviation from the safe band clamped
/// to [0, 1], then weighted. A vital absent from every in-window sample
/// contributes 0 and reports `None` in the breakdown. No samples at all
/// means no score.
pub fn score(
    patient_id: Uuid,
    window: &[VitalSample],
    weights: &RiskWeights,
    max_samples: usize,
    as_of: NaiveDateTime,
) -> Option<RiskScore> {
    if window.is_empty() {
        return None;
    }

    let hr_dev = recent_mean(window, VitalKind::HeartRate, max_samples)
        .map(|v| band_deviation(v, weights.hr_band, weights.hr_divisor));
    let temp_dev = recent_mean(window, VitalKind::Temperature, max_samples)
        .map(|v| band_deviation(v, weights.temp_band, weights.temp_divisor));
    let spo2_dev = recent_mean(window, VitalKind::Spo2, max_samples)
        .map(|v| floor_deviation(v, weights.spo2_floor, weights.spo2_divisor));

    let breakdown = RiskBreakdown {
        heart_rate: hr_dev.map(|d| weights.scale * weights.hr_weight * d),
        temperature: temp_dev.map(|d| weights.scale * weights.temp_weight * d),
        spo2: spo2_dev.map(|d| weights.scale * weights.spo2_weight * d),
    };

    let total = breakdown.heart_rate.unwrap_or(0.0)
        + breakdown.temperature.unwrap_or(0.0)
        + breakdown.spo2.unwrap_or(0.0);

    Some(RiskScore {
        patient_id,
        score: total,
        as_of,
        breakdown,
    })
}

/// Mean of the most recent `max_samples` values of one vital within the
/// window. `None` when the vital is absent from every sample.
fn recent_mean(window: &[VitalSample], kind: VitalKind, max_samples: usize) -> Option<f64> {
    let values: Vec<f64> = window
        .iter()
        .filter_map(|s| s.value(kind))
        .take(max_samples.max(1))
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Normalized deviation from a two-sided safe band, clamped to [0, 1].
fn band_deviation(value: f64, band: (f64, f64), divisor: f64) -> f64 {
    let above = (value - band.1) / divisor;
    let below = (band.0 - value) / divisor;
    above.max(below).max(0.0).min(1.0)
}

/// Normalized deviation below a one-sided floor, clamped to [0, 1].
fn floor_deviation(value: f64, floor: f64, divisor: f64) -> f64 {
    ((floor - value) / divisor).max(0.0).min(1.0)
}

// ---------------------------------------------------------------------------
// Trend series
// ---------------------------------------------------------------------------

/// One point of an interval-averaged trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    /// End of the interval this point summarizes.
    pub timestamp: NaiveDateTime,
    /// Interval mean; carried forward from the previous interval when no
    /// sample fell inside, `None` until a first value exists.
    pub value: Option<f64>,
}

/// Build an interval-averaged trend for one vital over `[start, end)`.
/// Empty intervals carry the last known value forward so charts stay
/// continuous.
pub fn trend_series(
    samples: &[VitalSample],
    kind: VitalKind,
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: Duration,
) -> Vec<TrendPoint> {
    if samples.is_empty() || interval <= Duration::zero() {
        return Vec::new();
    }

    let mut points: Vec<TrendPoint> = Vec::new();
    let mut interval_start = start;
    while interval_start < end {
        let interval_end = interval_start + interval;

        let in_interval: Vec<f64> = samples
            .iter()
            .filter(|s| s.recorded_at >= interval_start && s.recorded_at < interval_end)
            .filter_map(|s| s.value(kind))
            .collect();

        let value = if in_interval.is_empty() {
            points.last().and_then(|p| p.value)
        } else {
            Some(in_interval.iter().sum::<f64>() / in_interval.len() as f64)
        };

        points.push(TrendPoint {
            timestamp: interval_end,
            value,
        });
        interval_start = interval_end;
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn sample(offset_mins: i64, hr: Option<i64>, temp: Option<f64>, spo2: Option<f64>) -> VitalSample {
        VitalSample {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            recorded_at: base_time() + Duration::minutes(offset_mins),
            heart_rate: hr,
            temperature: temp,
            spo2,
        }
    }

    fn score_of(window: &[VitalSample]) -> Option<RiskScore> {
        score(
            Uuid::new_v4(),
            window,
            &RiskWeights::default(),
            3,
            base_time(),
        )
    }

    #[test]
    fn no_samples_means_no_opinion() {
        assert!(score_of(&[]).is_none());
    }

    #[test]
    fn in_band_vitals_score_zero() {
        let s = score_of(&[sample(0, Some(80), Some(36.8), Some(98.0))]).unwrap();
        assert_eq!(s.score, 0.0);
        assert_eq!(s.breakdown.heart_rate, Some(0.0));
    }

    #[test]
    fn fever_contributes_through_temperature_only() {
        // temp 38.1: deviation (38.1 - 37.4) / 2 = 0.35, weighted 10 * 0.3 * 0.35
        let s = score_of(&[sample(0, Some(78), Some(38.1), Some(97.0))]).unwrap();
        assert!((s.score - 1.05).abs() < 1e-9);
        assert!((s.breakdown.temperature.unwrap() - 1.05).abs() < 1e-9);
        assert_eq!(s.breakdown.heart_rate, Some(0.0));
        assert_eq!(s.breakdown.spo2, Some(0.0));
    }

    #[test]
    fn score_is_bounded_at_extremes() {
        let s = score_of(&[sample(0, Some(220), Some(45.0), Some(50.0))]).unwrap();
        assert!((s.score - 10.0).abs() < 1e-9);
        let low = score_of(&[sample(0, Some(20), Some(30.0), Some(100.0))]).unwrap();
        assert!(low.score <= 10.0 && low.score >= 0.0);
    }

    #[test]
    fn score_monotone_in_each_vital() {
        let mut last = -1.0;
        for hr in [100, 110, 120, 140, 180] {
            let s = score_of(&[sample(0, Some(hr), Some(36.8), Some(98.0))]).unwrap();
            assert!(s.score >= last, "hr {hr} decreased the score");
            last = s.score;
        }
        let mut last = -1.0;
        for spo2 in [94.0, 92.0, 90.0, 85.0, 80.0] {
            let s = score_of(&[sample(0, Some(80), Some(36.8), Some(spo2))]).unwrap();
            assert!(s.score >= last, "spo2 {spo2} decreased the score");
            last = s.score;
        }
    }

    #[test]
    fn mean_damps_single_sample_noise() {
        // one spike among three normals pulls the mean, not the max:
        // mean {150, 80, 80} = 103.33, still above the band but far less
        // than the spike alone
        let window = vec![
            sample(2, Some(150), None, None),
            sample(1, Some(80), None, None),
            sample(0, Some(80), None, None),
        ];
        let spike_only = score_of(&[sample(0, Some(150), None, None)]).unwrap();
        let damped = score_of(&window).unwrap();
        assert!(damped.score < spike_only.score);
        assert!(damped.score > 0.0);
    }

    #[test]
    fn missing_vital_reports_none_not_zero() {
        let s = score_of(&[sample(0, Some(80), None, None)]).unwrap();
        assert_eq!(s.breakdown.temperature, None);
        assert_eq!(s.breakdown.spo2, None);
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn trend_averages_within_intervals() {
        let samples = vec![
            sample(5, None, Some(37.0), None),
            sample(10, None, Some(38.0), None),
            sample(70, None, Some(39.0), None),
        ];
        let points = trend_series(
            &samples,
            VitalKind::Temperature,
            base_time(),
            base_time() + Duration::hours(2),
            Duration::hours(1),
        );
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, Some(37.5));
        assert_eq!(points[1].value, Some(39.0));
    }

    #[test]
    fn trend_carries_last_value_forward() {
        let samples = vec![sample(5, Some(80), None, None)];
        let points = trend_series(
            &samples,
            VitalKind::HeartRate,
            base_time(),
            base_time() + Duration::hours(3),
            Duration::hours(1),
        );
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].value, Some(80.0));
        assert_eq!(points[1].value, Some(80.0));
        assert_eq!(points[2].value, Some(80.0));
    }

    #[test]
    fn trend_is_none_before_first_value() {
        let samples = vec![sample(70, Some(80), None, None)];
        let points = trend_series(
            &samples,
            VitalKind::HeartRate,
            base_time(),
            base_time() + Duration::hours(2),
            Duration::hours(1),
        );
        assert_eq!(points[0].value, None);
        assert_eq!(points[1].value, Some(80.0));
    }
}
