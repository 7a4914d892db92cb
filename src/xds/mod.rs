//! Envoy xDS configuration derivation
//!
//! Turns the entity store into versioned snapshots of Envoy v3 resources:
//! - activation of listeners waiting on route tables
//! - projection and inclusion policy ([`SnapshotBuilder`])
//! - wire encoding per resource kind ([`ResourceEncoder`])
//! - versioning, consistency checking and installation ([`SnapshotPublisher`])
//!
//! Streaming snapshots to proxies is left to whatever consumes a [`SnapshotSink`].

pub mod activation;
pub mod builder;
pub mod cache;
pub mod cluster;
pub mod listener;
pub mod resources;
pub mod route;
pub mod snapshot;

pub use activation::Activation;
pub use builder::SnapshotBuilder;
pub use cache::{SnapshotCache, SnapshotPublisher, SnapshotSink};
pub use resources::{
    BuiltResource, EnvoyResourceEncoder, ResourceEncoder, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL,
    LISTENER_TYPE_URL, ROUTE_TYPE_URL,
};
pub use snapshot::{Snapshot, SnapshotReferences, SnapshotResources};
