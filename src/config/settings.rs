//! # Configuration Settings
//!
//! Defines the configuration structure for the Envoy configurator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Node identifier snapshots are installed for
    #[validate(length(min = 1, message = "Node id cannot be empty"))]
    pub node_id: String,

    /// Change requests replayed at startup
    pub bootstrap_file: Option<PathBuf>,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: super::DEFAULT_NODE_ID.to_string(),
            bootstrap_file: None,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        if let Some(path) = &self.bootstrap_file {
            if path.as_os_str().is_empty() {
                return Err(Error::validation_field(
                    "Bootstrap file path cannot be empty",
                    "bootstrap_file",
                ));
            }
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,

    /// Force debug logging regardless of `log_level`
    pub debug: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false, debug: false }
    }
}

impl ObservabilityConfig {
    /// Level the subscriber is initialised with
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}
