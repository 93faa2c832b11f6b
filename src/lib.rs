//! CareWatch core — streaming vital-sign alerting, supervised alert
//! lifecycle, and per-patient risk scoring.

pub mod config;
pub mod db;
pub mod engine;
pub mod locks;
pub mod models;
pub mod risk;
pub mod rules;
pub mod simulator;

pub use engine::{AlertEvent, AlertEventKind, AlertSink, CareEngine, EngineError, SampleOutcome};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for embedding binaries. Honors `RUST_LOG`, falling
/// back to the crate default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} core v{}", config::APP_NAME, config::APP_VERSION);
}
