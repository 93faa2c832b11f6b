//! Vitals simulator for demos and seeding.
//!
//! Produces plausible readings in normal ranges with a small chance of an
//! abnormal excursion, so seeded wards occasionally raise real alerts.

use rand::Rng;

/// One simulated reading. Always passes ingest validation.
#[derive(Debug, Clone)]
pub struct SimulatedVitals {
    pub heart_rate: i64,
    pub temperature: f64,
    pub spo2: f64,
}

/// Generate a random set of vitals.
pub fn generate_vitals<R: Rng>(rng: &mut R) -> SimulatedVitals {
    let mut hr = rng.gen_range(58..=100);
    let mut temp = round1(rng.gen_range(36.5..=37.5));
    let mut spo2 = rng.gen_range(94..=99) as f64;

    // small chance of abnormal excursions
    if rng.gen_bool(0.08) {
        temp = round1(rng.gen_range(38.1..=39.5));
    }
    if rng.gen_bool(0.06) {
        spo2 = rng.gen_range(85..=89) as f64;
    }
    if rng.gen_bool(0.07) {
        hr = rng.gen_range(45..=120);
    }

    SimulatedVitals {
        heart_rate: hr,
        temperature: temp,
        spo2,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
