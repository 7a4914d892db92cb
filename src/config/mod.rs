//! # Configuration Management
//!
//! Settings come from `CONFIGURATOR_*` environment variables (optionally loaded
//! from a `.env` file by the binary); command line flags override them.

pub mod settings;

pub use settings::{AppConfig, ObservabilityConfig};

use std::path::PathBuf;

use crate::Result;

pub const DEFAULT_NODE_ID: &str = "test-id";

pub const ENV_NODE_ID: &str = "CONFIGURATOR_NODE_ID";
pub const ENV_BOOTSTRAP_FILE: &str = "CONFIGURATOR_BOOTSTRAP_FILE";
pub const ENV_LOG_LEVEL: &str = "CONFIGURATOR_LOG_LEVEL";
pub const ENV_JSON_LOGGING: &str = "CONFIGURATOR_JSON_LOGGING";
pub const ENV_DEBUG: &str = "CONFIGURATOR_DEBUG";

impl AppConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let node_id =
            std::env::var(ENV_NODE_ID).unwrap_or_else(|_| DEFAULT_NODE_ID.to_string());

        let bootstrap_file = std::env::var(ENV_BOOTSTRAP_FILE).ok().map(PathBuf::from);

        let log_level = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string());
        let json_logging = parse_flag(ENV_JSON_LOGGING)?;
        let debug = parse_flag(ENV_DEBUG)?;

        let config = Self {
            node_id,
            bootstrap_file,
            observability: ObservabilityConfig { log_level, json_logging, debug },
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(name: &str) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(crate::Error::config(format!("Invalid value for {}: {}", name, other))),
        },
        Err(_) => Ok(false),
    }
}
