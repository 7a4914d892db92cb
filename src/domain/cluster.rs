//! Cluster domain types
//!
//! A cluster is a named group of upstream endpoints. Clusters are created
//! explicitly or on demand by the first endpoint that references them, and are
//! never removed when their last endpoint goes away.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::EntityState;

/// Upstream cluster with its endpoints keyed by endpoint name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub endpoints: HashMap<String, Endpoint>,
}

impl Cluster {
    /// Create an empty cluster
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), endpoints: HashMap::new() }
    }

    /// Get an endpoint by name
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// Number of endpoints in the `enabled` state
    pub fn enabled_endpoints(&self) -> usize {
        self.endpoints.values().filter(|e| e.state.is_enabled()).count()
    }
}

/// One upstream host:port inside a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub upstream_host: String,
    pub upstream_port: u32,
    pub state: EntityState,
}

impl Endpoint {
    /// Create an enabled endpoint
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u32) -> Self {
        Self {
            name: name.into(),
            upstream_host: host.into(),
            upstream_port: port,
            state: EntityState::Enabled,
        }
    }

    /// Get endpoint as "host:port" string
    pub fn to_socket_string(&self) -> String {
        if self.upstream_host.contains(':') {
            format!("[{}]:{}", self.upstream_host, self.upstream_port)
        } else {
            format!("{}:{}", self.upstream_host, self.upstream_port)
        }
    }
}
