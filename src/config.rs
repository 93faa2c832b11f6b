use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "CareWatch";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/CareWatch/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("CareWatch")
}

/// Default on-disk database path.
pub fn db_path() -> PathBuf {
    app_data_dir().join("carewatch.db")
}

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Thresholds for the alert rules.
#[derive(Debug, Clone)]
pub struct RuleThresholds {
    /// spo2 below this is critical.
    pub spo2_critical: f64,
    /// temperature at or above this is critical.
    pub temp_critical: f64,
    /// temperature at or above this (but below critical) is a warning.
    pub temp_warning: f64,
    /// heart rate above this is a warning.
    pub hr_warning: i64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            spo2_critical: 90.0,
            temp_critical: 38.0,
            temp_warning: 37.5,
            hr_warning: 100,
        }
    }
}

/// Safe bands and weights for risk scoring. Deviations are normalized
/// against the band before weighting, so each vital contributes in [0, 1].
#[derive(Debug, Clone)]
pub struct RiskWeights {
    pub hr_band: (f64, f64),
    pub hr_divisor: f64,
    pub temp_band: (f64, f64),
    pub temp_divisor: f64,
    pub spo2_floor: f64,
    pub spo2_divisor: f64,
    pub hr_weight: f64,
    pub temp_weight: f64,
    pub spo2_weight: f64,
    /// Final scale; with weights summing to 1.0 the score lands in
    /// [0, scale].
    pub scale: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            hr_band: (60.0, 100.0),
            hr_divisor: 40.0,
            temp_band: (36.1, 37.4),
            temp_divisor: 2.0,
            spo2_floor: 94.0,
            spo2_divisor: 10.0,
            hr_weight: 0.4,
            temp_weight: 0.3,
            spo2_weight: 0.3,
            scale: 10.0,
        }
    }
}

/// Hard validation ranges for submitted vitals. Values outside these are
/// physiologically implausible and rejected at ingest.
#[derive(Debug, Clone)]
pub struct ValueRanges {
    pub heart_rate: (i64, i64),
    pub temperature: (f64, f64),
    pub spo2: (f64, f64),
}

impl Default for ValueRanges {
    fn default() -> Self {
        Self {
            heart_rate: (20, 220),
            temperature: (30.0, 45.0),
            spo2: (50.0, 100.0),
        }
    }
}

/// Engine-wide tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thresholds: RuleThresholds,
    pub risk: RiskWeights,
    pub ranges: ValueRanges,
    /// Recent-window span used by trend rules and risk scoring.
    pub lookback: chrono::Duration,
    /// Maximum samples considered within the lookback window.
    pub lookback_samples: usize,
    /// Samples older than this are evicted on ingest.
    pub retention: chrono::Duration,
    /// How long a caller waits on a contended patient/alert lock before
    /// the operation fails Busy.
    pub lock_deadline: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: RuleThresholds::default(),
            risk: RiskWeights::default(),
            ranges: ValueRanges::default(),
            lookback: chrono::Duration::minutes(15),
            lookback_samples: 3,
            retention: chrono::Duration::hours(72),
            lock_deadline: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("CareWatch"));
    }

    #[test]
    fn db_path_under_app_data() {
        let db = db_path();
        assert!(db.starts_with(app_data_dir()));
    }

    #[test]
    fn risk_weights_sum_to_one() {
        let w = RiskWeights::default();
        let sum = w.hr_weight + w.temp_weight + w.spo2_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn warning_threshold_below_critical() {
        let t = RuleThresholds::default();
        assert!(t.temp_warning < t.temp_critical);
    }

    #[test]
    fn lookback_shorter_than_retention() {
        let c = EngineConfig::default();
        assert!(c.lookback < c.retention);
    }
}
