//! Versioned snapshot bundle and its consistency check

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::xds::resources::BuiltResource;
use crate::{Error, Result};

/// Cross-resource references recorded while building, checked before install.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotReferences {
    /// Primary (non-mirror) clusters targeted by each emitted route table
    pub route_clusters: HashMap<String, BTreeSet<String>>,
    /// Route table served by each emitted listener
    pub listener_routes: HashMap<String, String>,
}

/// Unversioned output of the snapshot builder.
#[derive(Debug, Clone, Default)]
pub struct SnapshotResources {
    pub endpoints: Vec<BuiltResource>,
    pub clusters: Vec<BuiltResource>,
    pub routes: Vec<BuiltResource>,
    pub listeners: Vec<BuiltResource>,
    pub references: SnapshotReferences,
}

impl SnapshotResources {
    pub fn total(&self) -> usize {
        self.endpoints.len() + self.clusters.len() + self.routes.len() + self.listeners.len()
    }
}

/// Immutable bundle installed for one node.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub node_id: String,
    pub built_at: DateTime<Utc>,
    pub endpoints: Vec<BuiltResource>,
    pub clusters: Vec<BuiltResource>,
    pub routes: Vec<BuiltResource>,
    pub listeners: Vec<BuiltResource>,
    pub references: SnapshotReferences,
}

impl Snapshot {
    pub fn new(version: u64, node_id: impl Into<String>, resources: SnapshotResources) -> Self {
        Self {
            version,
            node_id: node_id.into(),
            built_at: Utc::now(),
            endpoints: resources.endpoints,
            clusters: resources.clusters,
            routes: resources.routes,
            listeners: resources.listeners,
            references: resources.references,
        }
    }

    /// Version token as sent on the wire
    pub fn version_token(&self) -> String {
        self.version.to_string()
    }

    /// Verify that every emitted reference resolves inside this bundle.
    pub fn consistent(&self) -> Result<()> {
        let clusters = names(&self.clusters);
        let assignments = names(&self.endpoints);

        if let Some(missing) = clusters.iter().find(|name| !assignments.contains(*name)) {
            return Err(Error::inconsistent(format!(
                "cluster '{}' has no load assignment",
                missing
            )));
        }
        if let Some(orphan) = assignments.iter().find(|name| !clusters.contains(*name)) {
            return Err(Error::inconsistent(format!(
                "load assignment '{}' has no matching cluster",
                orphan
            )));
        }

        let routes = names(&self.routes);
        let mut route_clusters: Vec<_> = self.references.route_clusters.iter().collect();
        route_clusters.sort_by(|a, b| a.0.cmp(b.0));
        for (route, targets) in route_clusters {
            if let Some(target) = targets.iter().find(|c| !clusters.contains(c.as_str())) {
                return Err(Error::inconsistent(format!(
                    "route '{}' targets cluster '{}' which is not in the snapshot",
                    route, target
                )));
            }
        }

        let mut listener_routes: Vec<_> = self.references.listener_routes.iter().collect();
        listener_routes.sort_by(|a, b| a.0.cmp(b.0));
        for (listener, route) in listener_routes {
            if !routes.contains(route.as_str()) {
                return Err(Error::inconsistent(format!(
                    "listener '{}' serves route table '{}' which is not in the snapshot",
                    listener, route
                )));
            }
        }

        Ok(())
    }

    pub fn resource_counts(&self) -> [(&'static str, usize); 4] {
        [
            ("endpoints", self.endpoints.len()),
            ("clusters", self.clusters.len()),
            ("routes", self.routes.len()),
            ("listeners", self.listeners.len()),
        ]
    }

    pub fn cluster_names(&self) -> Vec<&str> {
        self.clusters.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn load_assignment(&self, cluster: &str) -> Option<&BuiltResource> {
        self.endpoints.iter().find(|r| r.name == cluster)
    }

    pub fn route(&self, name: &str) -> Option<&BuiltResource> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn listener(&self, name: &str) -> Option<&BuiltResource> {
        self.listeners.iter().find(|r| r.name == name)
    }
}

fn names(resources: &[BuiltResource]) -> HashSet<&str> {
    resources.iter().map(|r| r.name.as_str()).collect()
}
