//! Domain layer
//!
//! Plain entity types for the proxy routing primitives held by the
//! configuration core: clusters, endpoints, route tables, virtual hosts and
//! listeners. These types carry no storage or wire concerns; the
//! [`crate::storage::EntityStore`] owns their uniqueness invariants and the
//! [`crate::xds`] layer turns them into Envoy resources.

pub mod cluster;
pub mod listener;
pub mod route;

use serde::{Deserialize, Serialize};

pub use cluster::{Cluster, Endpoint};
pub use listener::Listener;
pub use route::{
    HeaderMatch, PathMatch, RouteEntry, RouteTable, TlsTermination, VirtualHost, VirtualHostKind,
};

/// Enabled/disabled toggle shared by endpoints and listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    #[default]
    Enabled,
    Disabled,
}

impl EntityState {
    pub fn is_enabled(self) -> bool {
        matches!(self, EntityState::Enabled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityState::Enabled => "enabled",
            EntityState::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
