//! Integration tests for configuration management
//!
//! These tests check that the configuration reads `CONFIGURATOR_*` variables
//! and that the configured node id is the one snapshots are installed for.

use std::env;
use std::sync::{Arc, Mutex};

use envoy_configurator::config::{ENV_BOOTSTRAP_FILE, ENV_DEBUG, ENV_NODE_ID};
use envoy_configurator::services::ConfigurationService;
use envoy_configurator::xds::SnapshotCache;
use envoy_configurator::{AppConfig, Result};
use tracing_test::traced_test;

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn restore(name: &str, original: Option<String>) {
    match original {
        Some(value) => env::set_var(name, value),
        None => env::remove_var(name),
    }
}

/// Snapshots land under the node id taken from the environment
#[traced_test]
#[test]
fn test_node_id_from_environment() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let original = env::var(ENV_NODE_ID).ok();

    env::set_var(ENV_NODE_ID, "edge-proxy-7");
    let config = AppConfig::from_env()?;
    restore(ENV_NODE_ID, original);

    let cache = Arc::new(SnapshotCache::new());
    let service = ConfigurationService::new(config.node_id.clone(), cache.clone());
    service.rebuild()?;

    assert!(cache.snapshot("edge-proxy-7").is_some());
    assert!(cache.snapshot("test-id").is_none());
    assert!(logs_contain("Published snapshot"));
    Ok(())
}

/// Test that configuration defaults work when no environment variables are set
#[test]
fn test_config_defaults_integration() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let originals: Vec<_> = [ENV_NODE_ID, ENV_BOOTSTRAP_FILE, ENV_DEBUG]
        .into_iter()
        .map(|name| (name, env::var(name).ok()))
        .collect();
    for (name, _) in &originals {
        env::remove_var(name);
    }

    let config = AppConfig::from_env()?;
    for (name, original) in originals {
        restore(name, original);
    }

    assert_eq!(config.node_id, "test-id");
    assert!(config.bootstrap_file.is_none());
    assert!(!config.observability.debug);
    Ok(())
}

/// Test that invalid configuration is properly rejected
#[test]
fn test_invalid_config_handling() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let original_node = env::var(ENV_NODE_ID).ok();
    let original_debug = env::var(ENV_DEBUG).ok();

    env::set_var(ENV_NODE_ID, "");
    assert!(AppConfig::from_env().is_err(), "Config should reject an empty node id");
    restore(ENV_NODE_ID, original_node);

    for invalid in ["maybe", "2", "enabled"] {
        env::set_var(ENV_DEBUG, invalid);
        assert!(AppConfig::from_env().is_err(), "Config should reject debug flag: {}", invalid);
    }
    restore(ENV_DEBUG, original_debug);
}
