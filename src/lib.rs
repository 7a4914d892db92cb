//! # Envoy Configurator
//!
//! In-memory configuration core for an Envoy control plane. It keeps a model
//! of clusters, endpoints, route tables, virtual hosts and listeners, and after
//! every change derives a consistent, versioned snapshot of Envoy v3 resources
//! for one node.
//!
//! ## Architecture
//!
//! ```text
//! ChangeRequest → ConfigurationService → EntityStore → activation pass
//!                                               ↓
//!                  SnapshotSink ← SnapshotPublisher ← SnapshotBuilder
//! ```
//!
//! ## Core Components
//!
//! - **Entity Store**: uniqueness and existence rules for every entity kind
//! - **Activation**: enables listeners once their route table has content
//! - **Snapshot Builder**: inclusion policy plus per-kind wire encoding
//! - **Snapshot Publisher**: versioning, consistency check, atomic install
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use envoy_configurator::{services::ConfigurationService, xds::SnapshotCache, Result};
//!
//! fn main() -> Result<()> {
//!     let cache = Arc::new(SnapshotCache::new());
//!     let service = ConfigurationService::new("test-id", cache.clone());
//!
//!     service.add_endpoint("e1", "c1", "10.0.0.1", 8080)?.into_result()?;
//!     service.add_route_table("r1", Some("c1".to_string()))?.into_result()?;
//!     service.add_listener("l1", "0.0.0.0", 10000, "r1")?.into_result()?;
//!
//!     assert!(cache.snapshot("test-id").is_some());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod services;
pub mod startup;
pub mod storage;
pub mod xds;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(APP_NAME, "envoy-configurator");
        assert!(!VERSION.is_empty());
    }
}
