//! # Observability Infrastructure
//!
//! Structured logging and metrics for the configurator.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::MetricsRecorder;

use crate::config::ObservabilityConfig;
use ::tracing::{debug, info};

/// Initialize logging and register metric descriptions
pub fn init_observability(config: &ObservabilityConfig) {
    let installed = init_logging(config);
    MetricsRecorder::new().register_snapshot_metrics();

    if !installed {
        debug!("Global subscriber already set, keeping it");
    }

    info!(
        log_level = %config.effective_log_level(),
        json_logging = %config.json_logging,
        "Observability initialized successfully"
    );
}
