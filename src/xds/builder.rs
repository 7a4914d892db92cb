//! Snapshot builder
//!
//! Projects the entity store into one resource list per kind, applying the
//! inclusion policy:
//!
//! - every cluster is emitted together with its endpoint list; disabled
//!   endpoints stay in the list and are marked unhealthy
//! - a route table is emitted only when usable (content and at least one
//!   listener assignment)
//! - a listener is emitted only when enabled
//!
//! Skipped route tables and listeners are idle configuration, not faults, and
//! only produce a log line. Each list is sorted by resource name so equal
//! stores always yield equal bundles.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{Cluster, HeaderMatch, Listener, PathMatch, RouteTable};
use crate::storage::EntityStore;
use crate::xds::resources::{BuiltResource, ResourceEncoder};
use crate::xds::snapshot::{SnapshotReferences, SnapshotResources};
use crate::{Error, Result};

/// Cluster as emitted: name plus all endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProjection {
    pub name: String,
    pub endpoints: Vec<EndpointProjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointProjection {
    pub name: String,
    pub host: String,
    pub port: u32,
    /// Enabled endpoints are healthy, disabled ones unhealthy
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteProjection {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHostProjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualHostProjection {
    pub name: String,
    pub domains: Vec<String>,
    pub require_tls: bool,
    pub routes: Vec<RouteRuleProjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRuleProjection {
    pub name: String,
    pub path: PathMatch,
    pub headers: Vec<HeaderMatch>,
    pub cluster: String,
    pub mirrors: Vec<MirrorPolicy>,
}

/// One request mirror attached to a route action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorPolicy {
    pub cluster: String,
    /// Percentage, emitted verbatim
    pub fraction: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerProjection {
    pub name: String,
    pub address: String,
    pub port: u32,
    pub route_table: String,
    pub listener_filters: Vec<String>,
    pub tls_chains: Vec<TlsChainProjection>,
}

/// TLS filter chain for one virtual host with termination material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsChainProjection {
    pub virtual_host: String,
    pub server_names: Vec<String>,
    pub cert_chain_file: String,
    pub private_key_file: String,
}

/// Builds snapshot resource lists from the store through a [`ResourceEncoder`].
pub struct SnapshotBuilder<'a> {
    encoder: &'a dyn ResourceEncoder,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(encoder: &'a dyn ResourceEncoder) -> Self {
        Self { encoder }
    }

    /// Project and encode the whole store.
    pub fn build(&self, store: &EntityStore) -> Result<SnapshotResources> {
        let mut resources = SnapshotResources::default();

        let mut clusters: Vec<&Cluster> = store.clusters().collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        for cluster in clusters {
            let projection = project_cluster(cluster);
            resources.clusters.push(named(&projection.name, self.encoder.cluster(&projection)?)?);
            resources
                .endpoints
                .push(named(&projection.name, self.encoder.load_assignment(&projection)?)?);
        }

        let mut tables: Vec<&RouteTable> = store.route_tables().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        for table in tables {
            if !table.is_usable() {
                info!(
                    route_table = %table.name,
                    assignments = table.assignments.len(),
                    has_content = table.has_content(),
                    "route {} is not usable, skipping",
                    table.name
                );
                continue;
            }

            let projection = project_route(store, table);
            resources.references.route_clusters.insert(
                projection.name.clone(),
                projection
                    .virtual_hosts
                    .iter()
                    .flat_map(|vh| vh.routes.iter().map(|r| r.cluster.clone()))
                    .collect::<BTreeSet<_>>(),
            );
            resources.routes.push(named(&projection.name, self.encoder.route(&projection)?)?);
        }

        let mut listeners: Vec<&Listener> = store.listeners().collect();
        listeners.sort_by(|a, b| a.name.cmp(&b.name));
        for listener in listeners {
            if !listener.state.is_enabled() {
                info!(listener = %listener.name, "listener '{}' is disabled, skipping", listener.name);
                continue;
            }

            let projection = project_listener(store, listener);
            resources
                .references
                .listener_routes
                .insert(projection.name.clone(), projection.route_table.clone());
            resources
                .listeners
                .push(named(&projection.name, self.encoder.listener(&projection)?)?);
        }

        debug!(
            clusters = resources.clusters.len(),
            endpoints = resources.endpoints.len(),
            routes = resources.routes.len(),
            listeners = resources.listeners.len(),
            total = resources.total(),
            "Built snapshot resources"
        );

        Ok(resources)
    }
}

/// Consistency and lookups go by name, so an encoder must keep the projected one.
fn named(expected: &str, built: BuiltResource) -> Result<BuiltResource> {
    if built.name != expected {
        return Err(Error::encoding(format!(
            "encoder renamed '{}' to '{}'",
            expected, built.name
        )));
    }
    Ok(built)
}

/// Project a cluster with every endpoint, enabled or not.
pub fn project_cluster(cluster: &Cluster) -> ClusterProjection {
    let mut endpoints: Vec<EndpointProjection> = cluster
        .endpoints
        .values()
        .map(|endpoint| EndpointProjection {
            name: endpoint.name.clone(),
            host: endpoint.upstream_host.clone(),
            port: endpoint.upstream_port,
            healthy: endpoint.state.is_enabled(),
        })
        .collect();
    endpoints.sort_by(|a, b| a.name.cmp(&b.name));

    ClusterProjection { name: cluster.name.clone(), endpoints }
}

/// Project a route table. A direct cluster target becomes a catch-all virtual
/// host named after the table, carrying the table-level mirrors.
pub fn project_route(store: &EntityStore, table: &RouteTable) -> RouteProjection {
    let mut virtual_hosts = Vec::with_capacity(table.virtual_hosts.len() + 1);

    if let Some(cluster) = &table.cluster {
        virtual_hosts.push(VirtualHostProjection {
            name: table.name.clone(),
            domains: vec!["*".to_string()],
            require_tls: false,
            routes: vec![RouteRuleProjection {
                name: table.name.clone(),
                path: PathMatch::default(),
                headers: Vec::new(),
                cluster: cluster.clone(),
                mirrors: compose_mirrors(store, &table.name, table.mirroring.iter()),
            }],
        });
    }

    let mut hosts: Vec<_> = table.virtual_hosts.values().collect();
    hosts.sort_by(|a, b| a.name.cmp(&b.name));
    for host in hosts {
        debug!(
            route_table = %table.name,
            virtual_host = %host.name,
            kind = ?host.kind,
            "Projecting virtual host"
        );
        let mut entries: Vec<_> = host.routes.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let routes = entries
            .into_iter()
            .map(|entry| RouteRuleProjection {
                name: entry.name.clone(),
                path: entry.path.clone(),
                headers: entry.headers.clone(),
                cluster: entry.cluster.clone(),
                mirrors: compose_mirrors(store, &entry.name, entry.mirroring.iter()),
            })
            .collect();

        virtual_hosts.push(VirtualHostProjection {
            name: host.name.clone(),
            domains: host.domains.clone(),
            require_tls: host.tls_only,
            routes,
        });
    }

    RouteProjection { name: table.name.clone(), virtual_hosts }
}

/// One mirror policy per (cluster, fraction) entry whose cluster is known to
/// the store. Fractions are neither clamped nor defaulted.
fn compose_mirrors<'m>(
    store: &EntityStore,
    route: &str,
    mirroring: impl Iterator<Item = (&'m String, &'m u32)>,
) -> Vec<MirrorPolicy> {
    let mut mirrors: Vec<MirrorPolicy> = mirroring
        .filter(|(cluster, _)| {
            let known = store.has_cluster(cluster);
            if !known {
                debug!(route = %route, cluster = %cluster, "mirror target cluster is unknown, skipping");
            }
            known
        })
        .map(|(cluster, fraction)| MirrorPolicy { cluster: cluster.clone(), fraction: *fraction })
        .collect();
    mirrors.sort_by(|a, b| a.cluster.cmp(&b.cluster));
    mirrors
}

/// Project a listener, adding one TLS chain per virtual host of its route
/// table that carries termination material.
pub fn project_listener(store: &EntityStore, listener: &Listener) -> ListenerProjection {
    let mut tls_chains: Vec<TlsChainProjection> = store
        .route_table(&listener.route_table)
        .map(|table| {
            table
                .virtual_hosts
                .values()
                .filter_map(|host| {
                    host.tls.as_ref().map(|tls| TlsChainProjection {
                        virtual_host: host.name.clone(),
                        server_names: host.domains.clone(),
                        cert_chain_file: tls.cert_chain_file.clone(),
                        private_key_file: tls.private_key_file.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    tls_chains.sort_by(|a, b| a.virtual_host.cmp(&b.virtual_host));

    ListenerProjection {
        name: listener.name.clone(),
        address: listener.address.clone(),
        port: listener.port,
        route_table: listener.route_table.clone(),
        listener_filters: listener.listener_filters().into_iter().map(String::from).collect(),
        tls_chains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityState, RouteEntry, TlsTermination, VirtualHost};
    use crate::xds::resources::EnvoyResourceEncoder;
    use tracing_test::traced_test;

    fn usable_store() -> EntityStore {
        let mut store = EntityStore::new();
        store.upsert_endpoint("e1", "c1", "10.0.0.1", 8080);
        store.add_route_table("r1", Some("c1".into())).unwrap();
        store
            .add_listener(Listener::new("l1", "0.0.0.0", 10000, "r1", EntityState::Enabled))
            .unwrap();
        store.assign_listener("r1", "l1");
        store
    }

    #[test]
    fn disabled_endpoints_are_kept_but_unhealthy() {
        let mut store = EntityStore::new();
        store.upsert_endpoint("e1", "c1", "10.0.0.1", 8080);
        store.upsert_endpoint("e2", "c1", "10.0.0.2", 8080);
        store.disable_endpoint("e2", "c1").unwrap();

        let projection = project_cluster(store.cluster("c1").unwrap());
        assert_eq!(projection.endpoints.len(), 2);
        assert!(projection.endpoints[0].healthy);
        assert!(!projection.endpoints[1].healthy);
    }

    #[test]
    fn direct_target_projects_catch_all_host() {
        let mut store = usable_store();
        store.add_mirroring("r1", "c1", 37).unwrap();

        let projection = project_route(&store, store.route_table("r1").unwrap());
        assert_eq!(projection.virtual_hosts.len(), 1);
        let host = &projection.virtual_hosts[0];
        assert_eq!(host.domains, vec!["*".to_string()]);
        assert_eq!(host.routes[0].cluster, "c1");
        assert_eq!(
            host.routes[0].mirrors,
            vec![MirrorPolicy { cluster: "c1".into(), fraction: 37 }]
        );
    }

    #[traced_test]
    #[test]
    fn dangling_mirrors_are_excluded_and_fractions_verbatim() {
        let mut store = usable_store();
        store.add_cluster("shadow").unwrap();
        store.add_mirroring("r1", "shadow", 250).unwrap();
        store.add_mirroring("r1", "ghost", 10).unwrap();

        let projection = project_route(&store, store.route_table("r1").unwrap());
        assert_eq!(
            projection.virtual_hosts[0].routes[0].mirrors,
            vec![MirrorPolicy { cluster: "shadow".into(), fraction: 250 }]
        );
        assert!(logs_contain("mirror target cluster is unknown"));
    }

    #[test]
    fn virtual_host_routes_and_tls_chains() {
        let mut store = EntityStore::new();
        store.add_cluster("api").unwrap();
        store.add_route_table("r1", None).unwrap();
        let tls = TlsTermination {
            cert_chain_file: "/certs/api.crt".into(),
            private_key_file: "/certs/api.key".into(),
        };
        store
            .add_virtual_host(
                "r1",
                VirtualHost::new("secure", vec!["api.example.com".into()])
                    .with_tls(tls, true)
                    .with_route(
                        RouteEntry::new("v1", PathMatch::Prefix("/v1".into()), "api")
                            .with_header("x-env", "prod"),
                    ),
            )
            .unwrap();
        let listener = Listener::new("l1", "0.0.0.0", 443, "r1", EntityState::Enabled);

        let route = project_route(&store, store.route_table("r1").unwrap());
        assert_eq!(route.virtual_hosts.len(), 1);
        assert!(route.virtual_hosts[0].require_tls);
        assert_eq!(route.virtual_hosts[0].routes[0].headers.len(), 1);

        let projected = project_listener(&store, &listener);
        assert_eq!(projected.listener_filters.len(), 2);
        assert_eq!(projected.tls_chains.len(), 1);
        assert_eq!(projected.tls_chains[0].server_names, vec!["api.example.com".to_string()]);
    }

    #[derive(Debug)]
    struct RenamingEncoder;

    impl ResourceEncoder for RenamingEncoder {
        fn cluster(&self, cluster: &ClusterProjection) -> Result<BuiltResource> {
            EnvoyResourceEncoder.cluster(cluster)
        }

        fn load_assignment(&self, cluster: &ClusterProjection) -> Result<BuiltResource> {
            let mut built = EnvoyResourceEncoder.load_assignment(cluster)?;
            built.name = format!("{}-eds", built.name);
            Ok(built)
        }

        fn route(&self, route: &RouteProjection) -> Result<BuiltResource> {
            EnvoyResourceEncoder.route(route)
        }

        fn listener(&self, listener: &ListenerProjection) -> Result<BuiltResource> {
            EnvoyResourceEncoder.listener(listener)
        }
    }

    #[test]
    fn encoder_must_keep_resource_names() {
        let store = usable_store();
        match SnapshotBuilder::new(&RenamingEncoder).build(&store) {
            Err(Error::Encoding(message)) => assert!(message.contains("c1-eds")),
            other => panic!("expected encoding error, got {:?}", other),
        }
    }

    #[traced_test]
    #[test]
    fn build_applies_inclusion_policy() {
        let mut store = usable_store();
        store.add_route_table("idle", Some("c1".into())).unwrap();
        store
            .add_listener(Listener::new("waiting", "0.0.0.0", 10001, "nowhere", EntityState::Disabled))
            .unwrap();

        let encoder = EnvoyResourceEncoder;
        let resources = SnapshotBuilder::new(&encoder).build(&store).expect("build");

        assert_eq!(resources.clusters.len(), 1);
        assert_eq!(resources.endpoints.len(), 1);
        assert_eq!(resources.routes.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["r1"]);
        assert_eq!(
            resources.listeners.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
            vec!["l1"]
        );
        assert_eq!(resources.references.listener_routes.get("l1"), Some(&"r1".to_string()));
        assert!(logs_contain("route idle is not usable, skipping"));
        assert!(logs_contain("listener 'waiting' is disabled, skipping"));
    }
}
