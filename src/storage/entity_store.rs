//! Entity store
//!
//! Mapping-based storage for clusters, route tables and listeners (endpoints
//! live inside their cluster, virtual hosts inside their route table). The
//! store enforces name uniqueness within each kind and the cluster
//! auto-creation cascade of [`EntityStore::upsert_endpoint`]. It never builds
//! or publishes snapshots itself.

use std::collections::HashMap;

use tracing::debug;

use super::kind;
use crate::domain::{Cluster, Endpoint, EntityState, Listener, RouteEntry, RouteTable, VirtualHost};
use crate::errors::{Error, Result};

/// Outcome of [`EntityStore::upsert_endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointUpsert {
    /// The referenced cluster did not exist and was created
    pub cluster_created: bool,
    /// An endpoint with the same name was overwritten
    pub replaced: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    clusters: HashMap<String, Cluster>,
    route_tables: HashMap<String, RouteTable>,
    listeners: HashMap<String, Listener>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- clusters and endpoints ----

    /// Create an empty cluster. Fails with `AlreadyExists` if the name is taken.
    pub fn add_cluster(&mut self, name: &str) -> Result<()> {
        if self.clusters.contains_key(name) {
            return Err(Error::already_exists(kind::CLUSTER, name));
        }
        self.clusters.insert(name.to_string(), Cluster::new(name));
        Ok(())
    }

    /// Insert or overwrite an endpoint in state `enabled`, creating `cluster`
    /// first when it does not exist yet.
    pub fn upsert_endpoint(
        &mut self,
        name: &str,
        cluster: &str,
        host: &str,
        port: u32,
    ) -> EndpointUpsert {
        let cluster_created = !self.clusters.contains_key(cluster);
        let entry = self.clusters.entry(cluster.to_string()).or_insert_with(|| {
            debug!(cluster = %cluster, "Creating cluster on first endpoint reference");
            Cluster::new(cluster)
        });

        let replaced =
            entry.endpoints.insert(name.to_string(), Endpoint::new(name, host, port)).is_some();

        EndpointUpsert { cluster_created, replaced }
    }

    /// Pure existence check for an endpoint inside a cluster.
    pub fn check_endpoint(&self, name: &str, cluster: &str) -> Result<()> {
        let found = self
            .clusters
            .get(cluster)
            .ok_or_else(|| Error::not_found(kind::CLUSTER, cluster))?;
        if !found.endpoints.contains_key(name) {
            return Err(Error::not_found(kind::ENDPOINT, name));
        }
        Ok(())
    }

    /// Remove an endpoint. The cluster is kept even when it becomes empty.
    pub fn delete_endpoint(&mut self, name: &str, cluster: &str) -> Result<Endpoint> {
        self.check_endpoint(name, cluster)?;
        self.clusters
            .get_mut(cluster)
            .and_then(|c| c.endpoints.remove(name))
            .ok_or_else(|| Error::not_found(kind::ENDPOINT, name))
    }

    pub fn disable_endpoint(&mut self, name: &str, cluster: &str) -> Result<()> {
        self.set_endpoint_state(name, cluster, EntityState::Disabled)
    }

    pub fn enable_endpoint(&mut self, name: &str, cluster: &str) -> Result<()> {
        self.set_endpoint_state(name, cluster, EntityState::Enabled)
    }

    fn set_endpoint_state(&mut self, name: &str, cluster: &str, state: EntityState) -> Result<()> {
        self.check_endpoint(name, cluster)?;
        let endpoint = self
            .clusters
            .get_mut(cluster)
            .and_then(|c| c.endpoints.get_mut(name))
            .ok_or_else(|| Error::not_found(kind::ENDPOINT, name))?;
        endpoint.state = state;
        Ok(())
    }

    // ---- route tables ----

    /// Create a route table with empty assignments and mirroring.
    pub fn add_route_table(&mut self, name: &str, cluster: Option<String>) -> Result<()> {
        if self.route_tables.contains_key(name) {
            return Err(Error::already_exists(kind::ROUTE_TABLE, name));
        }
        self.route_tables.insert(name.to_string(), RouteTable::new(name, cluster));
        Ok(())
    }

    /// Set (or replace) the direct cluster target of an existing table.
    pub fn set_route_cluster(&mut self, route_table: &str, cluster: &str) -> Result<()> {
        let table = self.route_table_mut(route_table)?;
        table.cluster = Some(cluster.to_string());
        Ok(())
    }

    /// Add a virtual host; names are unique within their route table.
    pub fn add_virtual_host(&mut self, route_table: &str, vhost: VirtualHost) -> Result<()> {
        let table = self.route_table_mut(route_table)?;
        if table.virtual_hosts.contains_key(&vhost.name) {
            return Err(Error::already_exists(kind::VIRTUAL_HOST, vhost.name));
        }
        table.virtual_hosts.insert(vhost.name.clone(), vhost);
        Ok(())
    }

    /// Insert or overwrite a named sub-route of a virtual host.
    pub fn add_route(&mut self, route_table: &str, vhost: &str, route: RouteEntry) -> Result<()> {
        let table = self.route_table_mut(route_table)?;
        let host = table
            .virtual_hosts
            .get_mut(vhost)
            .ok_or_else(|| Error::not_found(kind::VIRTUAL_HOST, vhost))?;
        host.routes.insert(route.name.clone(), route);
        Ok(())
    }

    /// Insert or overwrite a table-level mirror entry. `cluster` is not checked.
    ///
    /// Table-level mirrors ride on the direct cluster target, so a table
    /// without one must be mirrored per route instead.
    pub fn add_mirroring(&mut self, route_table: &str, cluster: &str, fraction: u32) -> Result<()> {
        let table = self.route_table_mut(route_table)?;
        if table.cluster.is_none() {
            return Err(Error::validation_field(
                format!(
                    "Route table '{}' has no direct cluster target; mirror a virtual host route instead",
                    route_table
                ),
                "route",
            ));
        }
        table.mirroring.insert(cluster.to_string(), fraction);
        Ok(())
    }

    /// Insert or overwrite a mirror entry on a virtual host's sub-route.
    pub fn add_route_mirroring(
        &mut self,
        route_table: &str,
        vhost: &str,
        route: &str,
        cluster: &str,
        fraction: u32,
    ) -> Result<()> {
        let table = self.route_table_mut(route_table)?;
        let entry = table
            .virtual_hosts
            .get_mut(vhost)
            .ok_or_else(|| Error::not_found(kind::VIRTUAL_HOST, vhost))?
            .routes
            .get_mut(route)
            .ok_or_else(|| Error::not_found(kind::ROUTE, route))?;
        entry.mirroring.insert(cluster.to_string(), fraction);
        Ok(())
    }

    /// Record `listener` as bound to `route_table`. Returns false if the table is missing.
    pub fn assign_listener(&mut self, route_table: &str, listener: &str) -> bool {
        match self.route_tables.get_mut(route_table) {
            Some(table) => {
                table.assignments.insert(listener.to_string());
                true
            }
            None => false,
        }
    }

    fn route_table_mut(&mut self, name: &str) -> Result<&mut RouteTable> {
        self.route_tables.get_mut(name).ok_or_else(|| Error::not_found(kind::ROUTE_TABLE, name))
    }

    // ---- listeners ----

    /// Insert a listener whose initial state has already been decided.
    pub fn add_listener(&mut self, listener: Listener) -> Result<()> {
        if self.listeners.contains_key(&listener.name) {
            return Err(Error::already_exists(kind::LISTENER, listener.name));
        }
        self.listeners.insert(listener.name.clone(), listener);
        Ok(())
    }

    pub fn set_listener_state(&mut self, name: &str, state: EntityState) -> Result<()> {
        let listener =
            self.listeners.get_mut(name).ok_or_else(|| Error::not_found(kind::LISTENER, name))?;
        listener.state = state;
        Ok(())
    }

    // ---- queries ----

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name)
    }

    pub fn has_cluster(&self, name: &str) -> bool {
        self.clusters.contains_key(name)
    }

    pub fn route_table(&self, name: &str) -> Option<&RouteTable> {
        self.route_tables.get(name)
    }

    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.listeners.get(name)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    pub fn route_tables(&self) -> impl Iterator<Item = &RouteTable> {
        self.route_tables.values()
    }

    pub fn listeners(&self) -> impl Iterator<Item = &Listener> {
        self.listeners.values()
    }
}
