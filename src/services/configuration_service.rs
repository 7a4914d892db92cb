//! Configuration coordinator
//!
//! Single writer over the entity store. Every mutation runs as one critical
//! section: change the store, run the activation pass, build the snapshot and
//! publish it. Queries take the read lock and never overlap a mutation.
//!
//! A mutation has two outcomes that callers need to tell apart:
//! - `Err(_)`: the change was rejected and nothing was mutated
//! - `Ok(Applied)`: the change is committed; [`Applied::publish`] says
//!   whether the resulting configuration went live

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::{ChangeRequest, EndpointSwitch};
use crate::domain::{EntityState, Listener, RouteEntry, VirtualHost, VirtualHostKind};
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::storage::EntityStore;
use crate::xds::{
    activation, Activation, EnvoyResourceEncoder, ResourceEncoder, SnapshotBuilder,
    SnapshotPublisher, SnapshotSink,
};
use crate::{mutation_span, snapshot_span};

/// Result of the rebuild that follows a committed change.
#[derive(Debug)]
pub enum PublishOutcome {
    Published { version: u64 },
    /// Saved but not yet live
    Failed(Error),
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// A committed change and what happened when publishing it.
#[derive(Debug)]
pub struct Applied {
    /// Listeners enabled by the activation pass that followed the change
    pub activated: Vec<Activation>,
    pub publish: PublishOutcome,
}

impl Applied {
    pub fn is_live(&self) -> bool {
        self.publish.is_published()
    }

    pub fn version(&self) -> Option<u64> {
        match self.publish {
            PublishOutcome::Published { version } => Some(version),
            PublishOutcome::Failed(_) => None,
        }
    }

    /// Collapse both outcomes into one error channel.
    pub fn into_result(self) -> Result<u64> {
        match self.publish {
            PublishOutcome::Published { version } => Ok(version),
            PublishOutcome::Failed(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub name: String,
    pub address: String,
    pub state: EntityState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub name: String,
    pub enabled_endpoints: usize,
    pub endpoints: Vec<EndpointStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VirtualHostStatus {
    pub name: String,
    pub kind: VirtualHostKind,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteTableStatus {
    pub name: String,
    pub cluster: Option<String>,
    pub virtual_hosts: Vec<VirtualHostStatus>,
    pub assignments: Vec<String>,
    pub usable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListenerStatus {
    pub name: String,
    pub address: String,
    pub port: u32,
    pub route_table: String,
    pub state: EntityState,
}

/// Point-in-time view of every entity plus the last published version.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationStatus {
    pub node_id: String,
    pub published_version: Option<u64>,
    pub clusters: Vec<ClusterStatus>,
    pub route_tables: Vec<RouteTableStatus>,
    pub listeners: Vec<ListenerStatus>,
}

#[derive(Debug, Default)]
struct Inner {
    store: EntityStore,
    publisher: SnapshotPublisher,
}

/// Owns the store and publishes a snapshot for one node after every change.
#[derive(Debug)]
pub struct ConfigurationService {
    node_id: String,
    inner: RwLock<Inner>,
    encoder: Arc<dyn ResourceEncoder>,
    sink: Arc<dyn SnapshotSink>,
    metrics: MetricsRecorder,
}

impl ConfigurationService {
    /// Create a service publishing Envoy v3 resources to `sink`
    pub fn new(node_id: impl Into<String>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self::with_encoder(node_id, Arc::new(EnvoyResourceEncoder), sink)
    }

    pub fn with_encoder(
        node_id: impl Into<String>,
        encoder: Arc<dyn ResourceEncoder>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            inner: RwLock::new(Inner::default()),
            encoder,
            sink,
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    // ---- mutations ----

    pub fn add_cluster(&self, name: &str) -> Result<Applied> {
        self.mutate("add_cluster", |store| store.add_cluster(name))
    }

    /// Upsert an endpoint, creating its cluster when missing
    pub fn add_endpoint(&self, name: &str, cluster: &str, host: &str, port: u32) -> Result<Applied> {
        self.mutate("add_endpoint", |store| {
            let upsert = store.upsert_endpoint(name, cluster, host, port);
            if upsert.cluster_created {
                info!(cluster = %cluster, endpoint = %name, "Cluster created by endpoint reference");
            }
            Ok(())
        })
    }

    pub fn delete_endpoint(&self, name: &str, cluster: &str) -> Result<Applied> {
        self.mutate("delete_endpoint", |store| store.delete_endpoint(name, cluster).map(|_| ()))
    }

    pub fn disable_endpoint(&self, name: &str, cluster: &str) -> Result<Applied> {
        self.mutate("disable_endpoint", |store| store.disable_endpoint(name, cluster))
    }

    pub fn enable_endpoint(&self, name: &str, cluster: &str) -> Result<Applied> {
        self.mutate("enable_endpoint", |store| store.enable_endpoint(name, cluster))
    }

    pub fn add_route_table(&self, name: &str, cluster: Option<String>) -> Result<Applied> {
        self.mutate("add_route_table", |store| store.add_route_table(name, cluster))
    }

    pub fn set_route_cluster(&self, route_table: &str, cluster: &str) -> Result<Applied> {
        self.mutate("set_route_cluster", |store| store.set_route_cluster(route_table, cluster))
    }

    pub fn add_virtual_host(&self, route_table: &str, vhost: VirtualHost) -> Result<Applied> {
        self.mutate("add_virtual_host", |store| store.add_virtual_host(route_table, vhost))
    }

    pub fn add_route(&self, route_table: &str, vhost: &str, route: RouteEntry) -> Result<Applied> {
        self.mutate("add_route", |store| store.add_route(route_table, vhost, route))
    }

    /// Mirror traffic of a table's direct cluster target
    pub fn add_mirroring(&self, route_table: &str, cluster: &str, fraction: u32) -> Result<Applied> {
        self.mutate("add_mirroring", |store| store.add_mirroring(route_table, cluster, fraction))
    }

    /// Mirror traffic of one virtual host sub-route
    pub fn add_route_mirroring(
        &self,
        route_table: &str,
        vhost: &str,
        route: &str,
        cluster: &str,
        fraction: u32,
    ) -> Result<Applied> {
        self.mutate("add_route_mirroring", |store| {
            store.add_route_mirroring(route_table, vhost, route, cluster, fraction)
        })
    }

    /// Create a listener, enabled right away when its route table has content
    pub fn add_listener(
        &self,
        name: &str,
        address: &str,
        port: u32,
        route_table: &str,
    ) -> Result<Applied> {
        self.mutate("add_listener", |store| {
            let state = activation::listener_initial_state(store, route_table);
            store.add_listener(Listener::new(name, address, port, route_table, state))?;
            if state.is_enabled() {
                store.assign_listener(route_table, name);
            } else {
                info!(
                    listener = %name,
                    route_table = %route_table,
                    "Listener created disabled, waiting for route table content"
                );
            }
            Ok(())
        })
    }

    /// Rebuild and publish without changing anything.
    pub fn rebuild(&self) -> Result<u64> {
        let mut inner = self.inner.write().expect("configuration lock poisoned");
        match self.publish_locked(&mut inner) {
            PublishOutcome::Published { version } => Ok(version),
            PublishOutcome::Failed(e) => Err(e),
        }
    }

    /// Validate and dispatch one administrative request
    pub fn apply(&self, request: ChangeRequest) -> Result<Applied> {
        if let Err(e) = request.validate() {
            self.metrics.record_mutation(request.operation(), false);
            debug!(operation = request.operation(), error = %e, "Change request failed validation");
            return Err(e);
        }

        match request {
            ChangeRequest::CreateCluster(req) => self.add_cluster(&req.name),
            ChangeRequest::AddEndpoint(req) => {
                self.add_endpoint(&req.name, &req.cluster, &req.host, req.port)
            }
            ChangeRequest::DeleteEndpoint(req) => self.delete_endpoint(&req.name, &req.cluster),
            ChangeRequest::SwitchEndpoint(req) => match req.switch {
                EndpointSwitch::On => self.enable_endpoint(&req.name, &req.cluster),
                EndpointSwitch::Off => self.disable_endpoint(&req.name, &req.cluster),
            },
            ChangeRequest::CreateRouteTable(req) => self.add_route_table(&req.name, req.cluster),
            ChangeRequest::AddVirtualHost(req) => {
                let vhost = req.to_virtual_host()?;
                self.add_virtual_host(&req.route_table, vhost)
            }
            ChangeRequest::AddRoute(req) => {
                let entry = req.to_route_entry()?;
                self.add_route(&req.route_table, &req.virtual_host, entry)
            }
            ChangeRequest::AddMirroring(req) => match req.route_target()? {
                Some((vhost, route)) => self.add_route_mirroring(
                    &req.route_table,
                    vhost,
                    route,
                    &req.cluster,
                    req.fraction,
                ),
                None => self.add_mirroring(&req.route_table, &req.cluster, req.fraction),
            },
            ChangeRequest::CreateListener(req) => {
                self.add_listener(&req.name, &req.address, req.port, &req.route_table)
            }
        }
    }

    // ---- queries ----

    pub fn check_endpoint(&self, name: &str, cluster: &str) -> Result<()> {
        let inner = self.inner.read().expect("configuration lock poisoned");
        inner.store.check_endpoint(name, cluster)
    }

    pub fn listener_state(&self, name: &str) -> Option<EntityState> {
        let inner = self.inner.read().expect("configuration lock poisoned");
        inner.store.listener(name).map(|listener| listener.state)
    }

    /// Run `f` against the store under the read lock
    pub fn with_store<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        let inner = self.inner.read().expect("configuration lock poisoned");
        f(&inner.store)
    }

    pub fn published_version(&self) -> Option<u64> {
        let inner = self.inner.read().expect("configuration lock poisoned");
        inner.publisher.published_version()
    }

    pub fn status(&self) -> ConfigurationStatus {
        let inner = self.inner.read().expect("configuration lock poisoned");
        let store = &inner.store;

        let mut clusters: Vec<ClusterStatus> = store
            .clusters()
            .map(|cluster| {
                let mut endpoints: Vec<EndpointStatus> = cluster
                    .endpoints
                    .values()
                    .map(|endpoint| EndpointStatus {
                        name: endpoint.name.clone(),
                        address: endpoint.to_socket_string(),
                        state: endpoint.state,
                    })
                    .collect();
                endpoints.sort_by(|a, b| a.name.cmp(&b.name));
                ClusterStatus {
                    name: cluster.name.clone(),
                    enabled_endpoints: cluster.enabled_endpoints(),
                    endpoints,
                }
            })
            .collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));

        let mut route_tables: Vec<RouteTableStatus> = store
            .route_tables()
            .map(|table| {
                let mut virtual_hosts: Vec<VirtualHostStatus> = table
                    .virtual_hosts
                    .values()
                    .map(|host| VirtualHostStatus {
                        name: host.name.clone(),
                        kind: host.kind,
                        domains: host.domains.clone(),
                    })
                    .collect();
                virtual_hosts.sort_by(|a, b| a.name.cmp(&b.name));
                let mut assignments: Vec<String> = table.assignments.iter().cloned().collect();
                assignments.sort();
                RouteTableStatus {
                    name: table.name.clone(),
                    cluster: table.cluster.clone(),
                    virtual_hosts,
                    assignments,
                    usable: table.is_usable(),
                }
            })
            .collect();
        route_tables.sort_by(|a, b| a.name.cmp(&b.name));

        let mut listeners: Vec<ListenerStatus> = store
            .listeners()
            .map(|listener| ListenerStatus {
                name: listener.name.clone(),
                address: listener.address.clone(),
                port: listener.port,
                route_table: listener.route_table.clone(),
                state: listener.state,
            })
            .collect();
        listeners.sort_by(|a, b| a.name.cmp(&b.name));

        ConfigurationStatus {
            node_id: self.node_id.clone(),
            published_version: inner.publisher.published_version(),
            clusters,
            route_tables,
            listeners,
        }
    }

    // ---- pipeline ----

    fn mutate<F>(&self, operation: &'static str, change: F) -> Result<Applied>
    where
        F: FnOnce(&mut EntityStore) -> Result<()>,
    {
        let span = mutation_span!(operation, node_id = %self.node_id);
        let _enter = span.enter();

        let mut inner = self.inner.write().expect("configuration lock poisoned");

        if let Err(e) = change(&mut inner.store) {
            self.metrics.record_mutation(operation, false);
            debug!(error = %e, "Change rejected");
            return Err(e);
        }
        self.metrics.record_mutation(operation, true);

        // Idempotent, so running it after every change is safe.
        let activated = activation::resolve(&mut inner.store);
        let publish = self.publish_locked(&mut inner);

        Ok(Applied { activated, publish })
    }

    fn publish_locked(&self, inner: &mut Inner) -> PublishOutcome {
        let span = snapshot_span!(self.node_id);
        let _enter = span.enter();

        let Inner { store, publisher } = inner;

        let resources = match SnapshotBuilder::new(self.encoder.as_ref()).build(store) {
            Ok(resources) => resources,
            Err(e) => {
                error!(error = %e, "Failed to encode snapshot resources");
                self.metrics.record_snapshot_build("encoding_error");
                return PublishOutcome::Failed(e);
            }
        };

        match publisher.publish(&self.node_id, resources, self.sink.as_ref()) {
            Ok(snapshot) => PublishOutcome::Published { version: snapshot.version },
            Err(e) => {
                warn!(error = %e, "Change saved but configuration is not live");
                PublishOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PathMatch, TlsTermination};
    use crate::xds::SnapshotCache;

    fn service() -> (ConfigurationService, Arc<SnapshotCache>) {
        let cache = Arc::new(SnapshotCache::new());
        let service = ConfigurationService::new("test-id", cache.clone());
        (service, cache)
    }

    #[test]
    fn rejected_change_does_not_rebuild() {
        let (service, cache) = service();
        service.add_cluster("c1").unwrap().into_result().unwrap();

        let err = service.add_cluster("c1").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert_eq!(cache.snapshot("test-id").unwrap().version, 1);
        assert_eq!(service.published_version(), Some(1));
    }

    #[test]
    fn listener_waits_for_route_table_content() {
        let (service, cache) = service();
        service.add_cluster("c1").unwrap();
        service.add_route_table("r1", None).unwrap();

        let applied = service.add_listener("l1", "0.0.0.0", 10000, "r1").unwrap();
        assert!(applied.activated.is_empty());
        assert_eq!(service.listener_state("l1"), Some(EntityState::Disabled));

        let applied = service
            .add_virtual_host(
                "r1",
                VirtualHost::new("default", vec!["*".into()])
                    .with_route(RouteEntry::new("all", PathMatch::default(), "c1")),
            )
            .unwrap();
        assert_eq!(
            applied.activated,
            vec![Activation { listener: "l1".into(), route_table: "r1".into() }]
        );

        let snapshot = cache.snapshot("test-id").unwrap();
        assert_eq!(snapshot.listener_names(), vec!["l1"]);
        assert_eq!(snapshot.route_names(), vec!["r1"]);
    }

    #[test]
    fn inconsistent_snapshot_is_saved_but_not_live() {
        let (service, cache) = service();
        service.add_route_table("r1", Some("ghost".into())).unwrap().into_result().unwrap();
        let before = cache.snapshot("test-id").unwrap().version;

        let applied = service.add_listener("l1", "0.0.0.0", 10000, "r1").unwrap();
        assert!(!applied.is_live());
        assert_eq!(service.listener_state("l1"), Some(EntityState::Enabled));
        assert!(matches!(applied.into_result(), Err(Error::InconsistentSnapshot { .. })));
        assert_eq!(cache.snapshot("test-id").unwrap().version, before);

        // Fixing the dangling reference makes the next rebuild go live.
        service.add_cluster("ghost").unwrap().into_result().unwrap();
        assert!(service.rebuild().unwrap() > before);
    }

    #[test]
    fn status_reports_sorted_entities() {
        let (service, _cache) = service();
        service.add_endpoint("e2", "c1", "10.0.0.2", 8080).unwrap();
        service.add_endpoint("e1", "c1", "::1", 8080).unwrap();
        service.disable_endpoint("e2", "c1").unwrap();
        service.add_route_table("r1", Some("c1".into())).unwrap();
        service.add_listener("l1", "0.0.0.0", 80, "r1").unwrap();
        let tls = TlsTermination {
            cert_chain_file: "/certs/api.crt".into(),
            private_key_file: "/certs/api.key".into(),
        };
        service
            .add_virtual_host(
                "r1",
                VirtualHost::new("secure", vec!["api.example.com".into()]).with_tls(tls, false),
            )
            .unwrap();

        let status = service.status();
        assert_eq!(status.node_id, "test-id");
        assert_eq!(status.clusters[0].enabled_endpoints, 1);
        assert_eq!(status.clusters[0].endpoints[0].address, "[::1]:8080");
        assert_eq!(status.clusters[0].endpoints[1].state, EntityState::Disabled);
        assert!(status.route_tables[0].usable);
        assert_eq!(status.route_tables[0].assignments, vec!["l1".to_string()]);
        assert_eq!(status.route_tables[0].virtual_hosts[0].kind, VirtualHostKind::Https);
        assert_eq!(status.published_version, Some(6));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["listeners"][0]["state"], "enabled");
        assert_eq!(json["route_tables"][0]["virtual_hosts"][0]["kind"], "https");
    }
}
