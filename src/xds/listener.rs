//! Listener encoding using envoy-types
//!
//! Every listener gets a plain HTTP filter chain whose connection manager
//! fetches its route table over RDS. Virtual hosts with TLS termination
//! material add a filter chain each, matched on SNI against their domains.

use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, data_source::Specifier, socket_address,
    transport_socket::ConfigType as TransportSocketConfigType, Address, DataSource, SocketAddress,
    TransportSocket,
};
use envoy_types::pb::envoy::config::listener::v3::{
    filter::ConfigType as FilterConfigType, Filter, FilterChain, FilterChainMatch, Listener,
    ListenerFilter,
};
use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router as RouterFilter;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::{CodecType, RouteSpecifier},
    http_filter::ConfigType as HttpFilterConfigType,
    HttpConnectionManager, HttpFilter, Rds,
};
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    CommonTlsContext, DownstreamTlsContext, TlsCertificate,
};
use envoy_types::pb::google::protobuf::Any;
use prost::Message;

use crate::xds::builder::{ListenerProjection, TlsChainProjection};
use crate::xds::cluster::ads_config_source;

const HTTP_CONNECTION_MANAGER: &str = "envoy.filters.network.http_connection_manager";
const HTTP_CONNECTION_MANAGER_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";
const ROUTER_FILTER: &str = "envoy.filters.http.router";
const ROUTER_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";
const DOWNSTREAM_TLS_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.DownstreamTlsContext";

/// Convert a listener projection to an Envoy Listener
pub fn to_envoy_listener(projection: &ListenerProjection) -> Listener {
    let socket_address = SocketAddress {
        address: projection.address.clone(),
        port_specifier: Some(socket_address::PortSpecifier::PortValue(projection.port)),
        ..Default::default()
    };

    let mut filter_chains: Vec<FilterChain> =
        projection.tls_chains.iter().map(|chain| tls_filter_chain(projection, chain)).collect();
    filter_chains.push(FilterChain {
        filters: vec![http_connection_manager_filter(projection, "ingress_http")],
        ..Default::default()
    });

    Listener {
        name: projection.name.clone(),
        address: Some(Address { address: Some(AddressType::SocketAddress(socket_address)) }),
        listener_filters: projection
            .listener_filters
            .iter()
            .map(|name| ListenerFilter { name: name.clone(), ..Default::default() })
            .collect(),
        filter_chains,
        ..Default::default()
    }
}

fn http_connection_manager_filter(projection: &ListenerProjection, stat_prefix: &str) -> Filter {
    let router = HttpFilter {
        name: ROUTER_FILTER.to_string(),
        config_type: Some(HttpFilterConfigType::TypedConfig(Any {
            type_url: ROUTER_TYPE_URL.to_string(),
            value: RouterFilter::default().encode_to_vec(),
        })),
        ..Default::default()
    };

    let hcm = HttpConnectionManager {
        codec_type: CodecType::Auto as i32,
        stat_prefix: stat_prefix.to_string(),
        route_specifier: Some(RouteSpecifier::Rds(Rds {
            config_source: Some(ads_config_source()),
            route_config_name: projection.route_table.clone(),
        })),
        http_filters: vec![router],
        ..Default::default()
    };

    Filter {
        name: HTTP_CONNECTION_MANAGER.to_string(),
        config_type: Some(FilterConfigType::TypedConfig(Any {
            type_url: HTTP_CONNECTION_MANAGER_TYPE_URL.to_string(),
            value: hcm.encode_to_vec(),
        })),
    }
}

fn tls_filter_chain(projection: &ListenerProjection, chain: &TlsChainProjection) -> FilterChain {
    let downstream = DownstreamTlsContext {
        common_tls_context: Some(CommonTlsContext {
            tls_certificates: vec![TlsCertificate {
                certificate_chain: Some(data_source_from_path(&chain.cert_chain_file)),
                private_key: Some(data_source_from_path(&chain.private_key_file)),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    };

    FilterChain {
        name: format!("{}-tls", chain.virtual_host),
        filter_chain_match: Some(FilterChainMatch {
            server_names: chain.server_names.clone(),
            ..Default::default()
        }),
        filters: vec![http_connection_manager_filter(projection, "ingress_https")],
        transport_socket: Some(TransportSocket {
            name: "envoy.transport_sockets.tls".to_string(),
            config_type: Some(TransportSocketConfigType::TypedConfig(Any {
                type_url: DOWNSTREAM_TLS_TYPE_URL.to_string(),
                value: downstream.encode_to_vec(),
            })),
        }),
        ..Default::default()
    }
}

fn data_source_from_path(path: &str) -> DataSource {
    DataSource { watched_directory: None, specifier: Some(Specifier::Filename(path.to_string())) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection(tls_chains: Vec<TlsChainProjection>) -> ListenerProjection {
        ListenerProjection {
            name: "l1".into(),
            address: "0.0.0.0".into(),
            port: 443,
            route_table: "r1".into(),
            listener_filters: vec![
                "envoy.filters.listener.tls_inspector".into(),
                "envoy.filters.listener.http_inspector".into(),
            ],
            tls_chains,
        }
    }

    fn decode_hcm(filter: &Filter) -> HttpConnectionManager {
        match filter.config_type.as_ref() {
            Some(FilterConfigType::TypedConfig(any)) => {
                assert_eq!(any.type_url, HTTP_CONNECTION_MANAGER_TYPE_URL);
                HttpConnectionManager::decode(any.value.as_slice()).expect("decode hcm")
            }
            other => panic!("unexpected filter config: {:?}", other),
        }
    }

    #[test]
    fn test_plain_listener_uses_rds() {
        let listener = to_envoy_listener(&projection(Vec::new()));
        assert_eq!(listener.name, "l1");
        assert_eq!(listener.listener_filters.len(), 2);
        assert_eq!(listener.filter_chains.len(), 1);

        let hcm = decode_hcm(&listener.filter_chains[0].filters[0]);
        match hcm.route_specifier {
            Some(RouteSpecifier::Rds(rds)) => assert_eq!(rds.route_config_name, "r1"),
            other => panic!("unexpected route specifier: {:?}", other),
        }
        assert_eq!(hcm.http_filters[0].name, ROUTER_FILTER);
    }

    #[test]
    fn test_tls_chain_per_virtual_host() {
        let listener = to_envoy_listener(&projection(vec![TlsChainProjection {
            virtual_host: "secure".into(),
            server_names: vec!["example.com".into()],
            cert_chain_file: "/certs/example.crt".into(),
            private_key_file: "/certs/example.key".into(),
        }]));

        assert_eq!(listener.filter_chains.len(), 2);
        let tls_chain = &listener.filter_chains[0];
        assert_eq!(tls_chain.name, "secure-tls");
        assert_eq!(
            tls_chain.filter_chain_match.as_ref().map(|m| m.server_names.clone()),
            Some(vec!["example.com".to_string()])
        );

        let socket = tls_chain.transport_socket.as_ref().expect("transport socket");
        let context = match socket.config_type.as_ref() {
            Some(TransportSocketConfigType::TypedConfig(any)) => {
                DownstreamTlsContext::decode(any.value.as_slice()).expect("decode tls")
            }
            other => panic!("unexpected transport socket config: {:?}", other),
        };
        let certificate = &context.common_tls_context.expect("common").tls_certificates[0];
        assert_eq!(
            certificate.certificate_chain.as_ref().and_then(|d| d.specifier.clone()),
            Some(Specifier::Filename("/certs/example.crt".into()))
        );
    }
}
