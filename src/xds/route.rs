//! Route configuration encoding using envoy-types

use envoy_types::pb::envoy::config::core::v3::RuntimeFractionalPercent;
use envoy_types::pb::envoy::config::route::v3::{
    header_matcher::HeaderMatchSpecifier, route::Action, route_action::ClusterSpecifier,
    route_action::RequestMirrorPolicy, route_match::PathSpecifier,
    virtual_host::TlsRequirementType, HeaderMatcher, Route, RouteAction, RouteConfiguration,
    RouteMatch, VirtualHost,
};
use envoy_types::pb::envoy::r#type::matcher::v3::{string_matcher::MatchPattern, StringMatcher};
use envoy_types::pb::envoy::r#type::v3::{fractional_percent::DenominatorType, FractionalPercent};

use crate::domain::{HeaderMatch, PathMatch};
use crate::xds::builder::{
    MirrorPolicy, RouteProjection, RouteRuleProjection, VirtualHostProjection,
};

/// Convert a route projection to an Envoy RouteConfiguration
pub fn to_envoy_route_configuration(projection: &RouteProjection) -> RouteConfiguration {
    RouteConfiguration {
        name: projection.name.clone(),
        virtual_hosts: projection.virtual_hosts.iter().map(to_envoy_virtual_host).collect(),
        ..Default::default()
    }
}

fn to_envoy_virtual_host(projection: &VirtualHostProjection) -> VirtualHost {
    let require_tls = if projection.require_tls {
        TlsRequirementType::All
    } else {
        TlsRequirementType::None
    };

    VirtualHost {
        name: projection.name.clone(),
        domains: projection.domains.clone(),
        routes: projection.routes.iter().map(to_envoy_route).collect(),
        require_tls: require_tls as i32,
        ..Default::default()
    }
}

fn to_envoy_route(projection: &RouteRuleProjection) -> Route {
    let path_specifier = match &projection.path {
        PathMatch::Prefix(prefix) => PathSpecifier::Prefix(prefix.clone()),
        PathMatch::Exact(path) => PathSpecifier::Path(path.clone()),
    };

    #[allow(deprecated)]
    let route_action = RouteAction {
        cluster_specifier: Some(ClusterSpecifier::Cluster(projection.cluster.clone())),
        request_mirror_policies: projection.mirrors.iter().map(to_envoy_mirror_policy).collect(),
        ..Default::default()
    };

    Route {
        name: projection.name.clone(),
        r#match: Some(RouteMatch {
            path_specifier: Some(path_specifier),
            headers: projection.headers.iter().map(to_envoy_header_matcher).collect(),
            ..Default::default()
        }),
        action: Some(Action::Route(route_action)),
        ..Default::default()
    }
}

fn to_envoy_header_matcher(header: &HeaderMatch) -> HeaderMatcher {
    HeaderMatcher {
        name: header.name.clone(),
        header_match_specifier: Some(HeaderMatchSpecifier::StringMatch(StringMatcher {
            match_pattern: Some(MatchPattern::Exact(header.value.clone())),
            ..Default::default()
        })),
        ..Default::default()
    }
}

/// Mirror `fraction` percent of requests to `cluster`; the value is not clamped
fn to_envoy_mirror_policy(mirror: &MirrorPolicy) -> RequestMirrorPolicy {
    RequestMirrorPolicy {
        cluster: mirror.cluster.clone(),
        runtime_fraction: Some(RuntimeFractionalPercent {
            default_value: Some(FractionalPercent {
                numerator: mirror.fraction,
                denominator: DenominatorType::Hundred as i32,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
