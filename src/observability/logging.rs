//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Create a tracing span for one store mutation and the rebuild it triggers
#[macro_export]
macro_rules! mutation_span {
    ($operation:expr) => {
        tracing::info_span!(
            "mutation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!(
            "mutation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for snapshot build and publish
#[macro_export]
macro_rules! snapshot_span {
    ($node_id:expr) => {
        tracing::debug_span!(
            "snapshot",
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($node_id:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "snapshot",
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a
/// subscriber was already installed (e.g. by a test harness).
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.effective_log_level()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logging {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    result.is_ok()
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        node_id = %config.node_id,
        bootstrap_file = ?config.bootstrap_file,
        log_level = %config.observability.effective_log_level(),
        json_logging = %config.observability.json_logging,
        "Envoy configurator configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = mutation_span!("add_cluster");
        let _span = mutation_span!("add_cluster", cluster = "c1");
        let _span = snapshot_span!("node-1");
        let _span = snapshot_span!("node-1", trigger = "rebuild");
    }

    #[test]
    fn test_log_config_info() {
        let config = crate::config::AppConfig::default();

        // This should not panic
        log_config_info(&config);
    }
}
