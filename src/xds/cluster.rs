//! Cluster and endpoint encoding using envoy-types
//!
//! Clusters are emitted as EDS clusters fetched over ADS; their endpoints go
//! out separately as a `ClusterLoadAssignment` of the same name.

use envoy_types::pb::envoy::config::cluster::v3::{
    cluster::{ClusterDiscoveryType, DiscoveryType, EdsClusterConfig, LbPolicy},
    Cluster,
};
use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, config_source::ConfigSourceSpecifier, socket_address,
    Address, AggregatedConfigSource, ApiVersion, ConfigSource, HealthStatus, SocketAddress,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::google::protobuf::Duration;

use crate::xds::builder::{ClusterProjection, EndpointProjection};

const CONNECT_TIMEOUT_SECONDS: i64 = 5;

/// Config source pointing back at the aggregated stream
pub(crate) fn ads_config_source() -> ConfigSource {
    ConfigSource {
        resource_api_version: ApiVersion::V3 as i32,
        config_source_specifier: Some(ConfigSourceSpecifier::Ads(
            AggregatedConfigSource::default(),
        )),
        ..Default::default()
    }
}

/// Convert a cluster projection to an EDS-backed Envoy cluster
pub fn to_envoy_cluster(projection: &ClusterProjection) -> Cluster {
    Cluster {
        name: projection.name.clone(),
        connect_timeout: Some(Duration { seconds: CONNECT_TIMEOUT_SECONDS, nanos: 0 }),
        cluster_discovery_type: Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32)),
        eds_cluster_config: Some(EdsClusterConfig {
            eds_config: Some(ads_config_source()),
            service_name: projection.name.clone(),
        }),
        lb_policy: LbPolicy::RoundRobin as i32,
        ..Default::default()
    }
}

/// Convert a cluster projection to its endpoint list
pub fn to_envoy_load_assignment(projection: &ClusterProjection) -> ClusterLoadAssignment {
    let lb_endpoints = projection.endpoints.iter().map(to_envoy_lb_endpoint).collect();

    ClusterLoadAssignment {
        cluster_name: projection.name.clone(),
        endpoints: vec![LocalityLbEndpoints { lb_endpoints, ..Default::default() }],
        ..Default::default()
    }
}

fn to_envoy_lb_endpoint(endpoint: &EndpointProjection) -> LbEndpoint {
    let socket_address = SocketAddress {
        address: endpoint.host.clone(),
        port_specifier: Some(socket_address::PortSpecifier::PortValue(endpoint.port)),
        ..Default::default()
    };

    let health_status = if endpoint.healthy { HealthStatus::Healthy } else { HealthStatus::Unhealthy };

    LbEndpoint {
        host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
            address: Some(Address { address: Some(AddressType::SocketAddress(socket_address)) }),
            hostname: endpoint.name.clone(),
            ..Default::default()
        })),
        health_status: health_status as i32,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection() -> ClusterProjection {
        ClusterProjection {
            name: "c1".into(),
            endpoints: vec![
                EndpointProjection {
                    name: "e1".into(),
                    host: "10.0.0.1".into(),
                    port: 8080,
                    healthy: true,
                },
                EndpointProjection {
                    name: "e2".into(),
                    host: "10.0.0.2".into(),
                    port: 8080,
                    healthy: false,
                },
            ],
        }
    }

    #[test]
    fn test_cluster_uses_eds_over_ads() {
        let cluster = to_envoy_cluster(&projection());
        assert_eq!(cluster.name, "c1");
        assert_eq!(
            cluster.cluster_discovery_type,
            Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32))
        );
        let eds = cluster.eds_cluster_config.expect("eds config");
        assert_eq!(eds.service_name, "c1");
        assert!(matches!(
            eds.eds_config.and_then(|c| c.config_source_specifier),
            Some(ConfigSourceSpecifier::Ads(_))
        ));
    }

    #[test]
    fn test_load_assignment_health_status() {
        let assignment = to_envoy_load_assignment(&projection());
        assert_eq!(assignment.cluster_name, "c1");
        let endpoints = &assignment.endpoints[0].lb_endpoints;
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].health_status, HealthStatus::Healthy as i32);
        assert_eq!(endpoints[1].health_status, HealthStatus::Unhealthy as i32);

        match &endpoints[0].host_identifier {
            Some(lb_endpoint::HostIdentifier::Endpoint(endpoint)) => {
                match endpoint.address.as_ref().and_then(|a| a.address.as_ref()) {
                    Some(AddressType::SocketAddress(socket)) => {
                        assert_eq!(socket.address, "10.0.0.1");
                        assert_eq!(
                            socket.port_specifier,
                            Some(socket_address::PortSpecifier::PortValue(8080))
                        );
                    }
                    other => panic!("unexpected address: {:?}", other),
                }
            }
            other => panic!("unexpected host identifier: {:?}", other),
        }
    }
}
