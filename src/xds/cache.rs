//! Snapshot publication
//!
//! [`SnapshotPublisher`] stamps built resources with a version, checks the
//! bundle and hands it to a [`SnapshotSink`]. [`SnapshotCache`] is the
//! in-process sink: it keeps the current snapshot per node and broadcasts every
//! install to subscribers (the distribution side).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::observability::MetricsRecorder;
use crate::xds::snapshot::{Snapshot, SnapshotResources};
use crate::{Error, Result};

const UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Handoff point to the distribution subsystem.
///
/// An install either replaces the node's snapshot completely or fails and leaves
/// the previous one in place.
pub trait SnapshotSink: Send + Sync + std::fmt::Debug {
    fn install(&self, node_id: &str, snapshot: Arc<Snapshot>) -> Result<()>;
}

/// Current snapshot per node, with install notifications.
#[derive(Debug)]
pub struct SnapshotCache {
    snapshots: RwLock<HashMap<String, Arc<Snapshot>>>,
    update_tx: broadcast::Sender<Arc<Snapshot>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self { snapshots: RwLock::new(HashMap::new()), update_tx }
    }

    /// Snapshot currently installed for `node_id`
    pub fn snapshot(&self, node_id: &str) -> Option<Arc<Snapshot>> {
        let snapshots = self.snapshots.read().expect("snapshot cache lock poisoned");
        snapshots.get(node_id).cloned()
    }

    /// Subscribe to install notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.update_tx.subscribe()
    }

    /// Drop the snapshot for `node_id`, returning it if there was one
    pub fn clear(&self, node_id: &str) -> Option<Arc<Snapshot>> {
        let mut snapshots = self.snapshots.write().expect("snapshot cache lock poisoned");
        snapshots.remove(node_id)
    }

    pub fn node_ids(&self) -> Vec<String> {
        let snapshots = self.snapshots.read().expect("snapshot cache lock poisoned");
        let mut nodes: Vec<String> = snapshots.keys().cloned().collect();
        nodes.sort();
        nodes
    }
}

impl SnapshotSink for SnapshotCache {
    fn install(&self, node_id: &str, snapshot: Arc<Snapshot>) -> Result<()> {
        {
            let mut snapshots = self.snapshots.write().expect("snapshot cache lock poisoned");
            if let Some(current) = snapshots.get(node_id) {
                if snapshot.version <= current.version {
                    return Err(Error::publish(
                        node_id,
                        format!(
                            "version {} does not supersede installed version {}",
                            snapshot.version, current.version
                        ),
                    ));
                }
            }
            snapshots.insert(node_id.to_string(), Arc::clone(&snapshot));
        }

        // No receivers is not an error; the snapshot stays readable from the cache.
        if self.update_tx.send(snapshot).is_err() {
            debug!(node_id = %node_id, "No snapshot subscribers");
        }
        Ok(())
    }
}

/// Assigns versions and publishes snapshots. Lives under the coordinator's
/// write lock, so the counter needs no synchronisation of its own.
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    next_version: u64,
    published: Option<u64>,
    metrics: MetricsRecorder,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the last successful publish
    pub fn published_version(&self) -> Option<u64> {
        self.published
    }

    /// Version numbers handed out so far, including rejected attempts
    pub fn attempts(&self) -> u64 {
        self.next_version
    }

    /// Version, check and install one bundle.
    ///
    /// A version is consumed even when the bundle is rejected, so a later
    /// attempt never reuses it.
    pub fn publish(
        &mut self,
        node_id: &str,
        resources: SnapshotResources,
        sink: &dyn SnapshotSink,
    ) -> Result<Arc<Snapshot>> {
        self.next_version += 1;
        let snapshot = Snapshot::new(self.next_version, node_id, resources);

        if let Err(e) = snapshot.consistent() {
            warn!(node_id = %node_id, version = snapshot.version, error = %e, "Snapshot failed consistency check");
            self.metrics.record_snapshot_build("inconsistent");
            return Err(e);
        }

        let snapshot = Arc::new(snapshot);
        if let Err(e) = sink.install(node_id, Arc::clone(&snapshot)) {
            warn!(node_id = %node_id, version = snapshot.version, error = %e, "Snapshot install rejected");
            self.metrics.record_snapshot_build("rejected");
            return Err(match e {
                Error::PublishFailure { .. } => e,
                other => Error::publish(node_id, other.to_string()),
            });
        }

        self.published = Some(snapshot.version);
        self.metrics.record_snapshot_build("success");
        self.metrics.update_snapshot_version(snapshot.version);
        for (kind, count) in snapshot.resource_counts() {
            self.metrics.update_snapshot_resources(kind, count);
        }

        info!(
            node_id = %node_id,
            version = snapshot.version,
            clusters = snapshot.clusters.len(),
            routes = snapshot.routes.len(),
            listeners = snapshot.listeners.len(),
            "Published snapshot"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xds::resources::BuiltResource;
    use envoy_types::pb::google::protobuf::Any;

    #[derive(Debug)]
    struct RejectingSink;

    impl SnapshotSink for RejectingSink {
        fn install(&self, node_id: &str, _snapshot: Arc<Snapshot>) -> Result<()> {
            Err(Error::publish(node_id, "distribution unavailable"))
        }
    }

    fn resources(cluster: &str) -> SnapshotResources {
        let built = BuiltResource { name: cluster.to_string(), resource: Any::default() };
        SnapshotResources {
            clusters: vec![built.clone()],
            endpoints: vec![built],
            ..Default::default()
        }
    }

    #[test]
    fn versions_start_at_one_and_increase() {
        let cache = SnapshotCache::new();
        let mut publisher = SnapshotPublisher::new();

        let first = publisher.publish("node", resources("c1"), &cache).unwrap();
        let second = publisher.publish("node", resources("c1"), &cache).unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(cache.snapshot("node").unwrap().version, 2);
        assert_eq!(publisher.published_version(), Some(2));
    }

    #[test]
    fn inconsistent_bundle_keeps_previous_snapshot() {
        let cache = SnapshotCache::new();
        let mut publisher = SnapshotPublisher::new();
        publisher.publish("node", resources("c1"), &cache).unwrap();

        let mut broken = resources("c2");
        broken.endpoints.clear();
        let err = publisher.publish("node", broken, &cache).unwrap_err();

        assert!(matches!(err, Error::InconsistentSnapshot { .. }));
        assert_eq!(cache.snapshot("node").unwrap().version, 1);
        assert_eq!(publisher.attempts(), 2);

        let next = publisher.publish("node", resources("c1"), &cache).unwrap();
        assert_eq!(next.version, 3);
    }

    #[test]
    fn sink_rejection_is_publish_failure() {
        let mut publisher = SnapshotPublisher::new();
        let err = publisher.publish("node", resources("c1"), &RejectingSink).unwrap_err();
        assert!(matches!(err, Error::PublishFailure { .. }));
        assert!(err.is_retryable());
        assert_eq!(publisher.published_version(), None);
    }

    #[test]
    fn cache_rejects_stale_versions() {
        let cache = SnapshotCache::new();
        cache.install("node", Arc::new(Snapshot::new(5, "node", resources("c1")))).unwrap();

        let err = cache
            .install("node", Arc::new(Snapshot::new(5, "node", resources("c2"))))
            .unwrap_err();
        assert!(matches!(err, Error::PublishFailure { .. }));
        assert_eq!(cache.snapshot("node").unwrap().cluster_names(), vec!["c1"]);

        assert!(cache.clear("node").is_some());
        assert!(cache.snapshot("node").is_none());
    }

    #[tokio::test]
    async fn subscribers_receive_installs() {
        let cache = SnapshotCache::new();
        let mut rx1 = cache.subscribe();
        let mut rx2 = cache.subscribe();
        let mut publisher = SnapshotPublisher::new();

        publisher.publish("node-a", resources("c1"), &cache).unwrap();

        let update1 = rx1.recv().await.expect("subscriber one update");
        let update2 = rx2.recv().await.expect("subscriber two update");
        assert_eq!(update1.version, 1);
        assert_eq!(update2.node_id, "node-a");
        assert_eq!(cache.node_ids(), vec!["node-a".to_string()]);
    }
}
