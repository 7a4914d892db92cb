//! Built xDS resources and the per-kind encoder seam
//!
//! The snapshot builder decides *what* is emitted; a [`ResourceEncoder`]
//! decides *how* each projected entity looks on the wire. The default
//! [`EnvoyResourceEncoder`] produces Envoy v3 protobufs packed into `Any`.

use envoy_types::pb::google::protobuf::Any;
use prost::Message;

use crate::xds::builder::{ClusterProjection, ListenerProjection, RouteProjection};
use crate::xds::{cluster, listener, route};
use crate::Result;

pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ENDPOINT_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";

/// Wrapper for a built Envoy resource along with its name.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltResource {
    pub name: String,
    pub resource: Any,
}

impl BuiltResource {
    /// Encode `message` and pack it under `type_url`
    pub fn from_message<M: Message>(
        name: impl Into<String>,
        type_url: &str,
        message: &M,
    ) -> Self {
        Self {
            name: name.into(),
            resource: Any { type_url: type_url.to_string(), value: message.encode_to_vec() },
        }
    }

    pub fn into_any(self) -> Any {
        self.resource
    }

    pub fn type_url(&self) -> &str {
        &self.resource.type_url
    }

    pub fn encoded_len(&self) -> usize {
        self.resource.value.len()
    }
}

/// Pure mapping from projected entities to wire resources, one method per kind.
pub trait ResourceEncoder: Send + Sync + std::fmt::Debug {
    fn cluster(&self, cluster: &ClusterProjection) -> Result<BuiltResource>;

    /// Endpoint list resource paired with a cluster
    fn load_assignment(&self, cluster: &ClusterProjection) -> Result<BuiltResource>;

    fn route(&self, route: &RouteProjection) -> Result<BuiltResource>;

    fn listener(&self, listener: &ListenerProjection) -> Result<BuiltResource>;
}

/// Envoy v3 encoder used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvoyResourceEncoder;

impl ResourceEncoder for EnvoyResourceEncoder {
    fn cluster(&self, projection: &ClusterProjection) -> Result<BuiltResource> {
        let envoy = cluster::to_envoy_cluster(projection);
        Ok(BuiltResource::from_message(&projection.name, CLUSTER_TYPE_URL, &envoy))
    }

    fn load_assignment(&self, projection: &ClusterProjection) -> Result<BuiltResource> {
        let envoy = cluster::to_envoy_load_assignment(projection);
        Ok(BuiltResource::from_message(&projection.name, ENDPOINT_TYPE_URL, &envoy))
    }

    fn route(&self, projection: &RouteProjection) -> Result<BuiltResource> {
        let envoy = route::to_envoy_route_configuration(projection);
        Ok(BuiltResource::from_message(&projection.name, ROUTE_TYPE_URL, &envoy))
    }

    fn listener(&self, projection: &ListenerProjection) -> Result<BuiltResource> {
        let envoy = listener::to_envoy_listener(projection);
        Ok(BuiltResource::from_message(&projection.name, LISTENER_TYPE_URL, &envoy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xds::builder::EndpointProjection;
    use envoy_types::pb::envoy::config::cluster::v3::Cluster;

    #[test]
    fn built_resource_round_trips_through_any() {
        let projection = ClusterProjection {
            name: "c1".into(),
            endpoints: vec![EndpointProjection {
                name: "e1".into(),
                host: "10.0.0.1".into(),
                port: 8080,
                healthy: true,
            }],
        };

        let built = EnvoyResourceEncoder.cluster(&projection).expect("encode cluster");
        assert_eq!(built.name, "c1");
        assert_eq!(built.type_url(), CLUSTER_TYPE_URL);
        assert!(built.encoded_len() > 0);

        let decoded = Cluster::decode(built.into_any().value.as_slice()).expect("decode");
        assert_eq!(decoded.name, "c1");
    }
}
