//! Global subscriber installation
//!
//! Kept in its own test binary: installing the global default would break
//! `#[traced_test]` tests sharing the process.

use envoy_configurator::config::ObservabilityConfig;
use envoy_configurator::observability::{init_logging, init_observability};

#[test]
fn test_init_observability_installs_once() {
    let config = ObservabilityConfig { json_logging: true, ..Default::default() };

    assert!(init_logging(&config), "first install should win");
    assert!(!init_logging(&config), "subscriber is already set");

    // Later calls keep the installed subscriber and must not panic
    init_observability(&config);
    init_observability(&ObservabilityConfig::default());
}
