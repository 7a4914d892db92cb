//! Administrative change requests
//!
//! One request describes one change. Requests are deserialized from whatever
//! carries them (the bootstrap file, an outer admin surface), validated, and
//! then dispatched by [`crate::services::ConfigurationService::apply`].

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{PathMatch, RouteEntry, TlsTermination, VirtualHost};
use crate::errors::{Error, Result};

/// One administrative change, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangeRequest {
    CreateCluster(CreateClusterRequest),
    AddEndpoint(AddEndpointRequest),
    DeleteEndpoint(EndpointRefRequest),
    SwitchEndpoint(SwitchEndpointRequest),
    CreateRouteTable(CreateRouteTableRequest),
    AddVirtualHost(AddVirtualHostRequest),
    AddRoute(AddRouteRequest),
    AddMirroring(AddMirroringRequest),
    CreateListener(CreateListenerRequest),
}

impl ChangeRequest {
    /// Operation name used in logs and metrics
    pub fn operation(&self) -> &'static str {
        match self {
            ChangeRequest::CreateCluster(_) => "create_cluster",
            ChangeRequest::AddEndpoint(_) => "add_endpoint",
            ChangeRequest::DeleteEndpoint(_) => "delete_endpoint",
            ChangeRequest::SwitchEndpoint(_) => "switch_endpoint",
            ChangeRequest::CreateRouteTable(_) => "create_route_table",
            ChangeRequest::AddVirtualHost(_) => "add_virtual_host",
            ChangeRequest::AddRoute(_) => "add_route",
            ChangeRequest::AddMirroring(_) => "add_mirroring",
            ChangeRequest::CreateListener(_) => "create_listener",
        }
    }

    /// Validate field constraints and cross-field rules
    pub fn validate(&self) -> Result<()> {
        match self {
            ChangeRequest::CreateCluster(req) => Validate::validate(req)?,
            ChangeRequest::AddEndpoint(req) => Validate::validate(req)?,
            ChangeRequest::DeleteEndpoint(req) => Validate::validate(req)?,
            ChangeRequest::SwitchEndpoint(req) => Validate::validate(req)?,
            ChangeRequest::CreateRouteTable(req) => Validate::validate(req)?,
            ChangeRequest::AddVirtualHost(req) => {
                Validate::validate(req)?;
                req.tls()?;
            }
            ChangeRequest::AddRoute(req) => {
                Validate::validate(req)?;
                req.path_match()?;
            }
            ChangeRequest::AddMirroring(req) => {
                Validate::validate(req)?;
                req.route_target()?;
            }
            ChangeRequest::CreateListener(req) => Validate::validate(req)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterRequest {
    #[validate(length(min = 1, message = "Cluster name cannot be empty"))]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddEndpointRequest {
    #[validate(length(min = 1, message = "Endpoint name cannot be empty"))]
    pub name: String,

    /// Created on demand when it does not exist
    #[validate(length(min = 1, message = "Cluster name cannot be empty"))]
    pub cluster: String,

    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRefRequest {
    #[validate(length(min = 1, message = "Endpoint name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Cluster name cannot be empty"))]
    pub cluster: String,
}

/// Target state of a switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSwitch {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SwitchEndpointRequest {
    #[validate(length(min = 1, message = "Endpoint name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Cluster name cannot be empty"))]
    pub cluster: String,

    pub switch: EndpointSwitch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteTableRequest {
    #[validate(length(min = 1, message = "Route table name cannot be empty"))]
    pub name: String,

    /// Direct cluster target for the whole table
    #[serde(default)]
    #[validate(length(min = 1, message = "Cluster name cannot be empty"))]
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddVirtualHostRequest {
    #[validate(length(min = 1, message = "Virtual host name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Route table name cannot be empty"))]
    pub route_table: String,

    #[validate(length(min = 1, message = "At least one domain is required"))]
    pub domains: Vec<String>,

    #[serde(default)]
    pub cert_chain_file: Option<String>,

    #[serde(default)]
    pub private_key_file: Option<String>,

    /// Reject plain HTTP on this host
    #[serde(default)]
    pub tls_only: bool,
}

impl AddVirtualHostRequest {
    /// TLS material, present only when both locators are given
    pub fn tls(&self) -> Result<Option<TlsTermination>> {
        match (&self.cert_chain_file, &self.private_key_file) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => {
                Ok(Some(TlsTermination {
                    cert_chain_file: cert.clone(),
                    private_key_file: key.clone(),
                }))
            }
            (None, None) if self.tls_only => Err(Error::validation_field(
                "tlsOnly requires a certificate chain and private key",
                "tls_only",
            )),
            (None, None) => Ok(None),
            _ => Err(Error::validation_field(
                "certChainFile and privateKeyFile must be given together",
                "cert_chain_file",
            )),
        }
    }

    pub fn to_virtual_host(&self) -> Result<VirtualHost> {
        let host = VirtualHost::new(&self.name, self.domains.clone());
        Ok(match self.tls()? {
            Some(tls) => host.with_tls(tls, self.tls_only),
            None => host,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HeaderMatchDto {
    #[validate(length(min = 1, message = "Header name cannot be empty"))]
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddRouteRequest {
    #[validate(length(min = 1, message = "Route name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Route table name cannot be empty"))]
    pub route_table: String,

    #[validate(length(min = 1, message = "Virtual host name cannot be empty"))]
    pub virtual_host: String,

    /// Path prefix; defaults to `/` when neither `prefix` nor `path` is set
    #[serde(default)]
    pub prefix: Option<String>,

    /// Exact path
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub headers: Vec<HeaderMatchDto>,

    #[validate(length(min = 1, message = "Cluster name cannot be empty"))]
    pub cluster: String,
}

impl AddRouteRequest {
    pub fn path_match(&self) -> Result<PathMatch> {
        match (&self.prefix, &self.path) {
            (Some(_), Some(_)) => {
                Err(Error::validation_field("Only one of prefix or path may be set", "path"))
            }
            (Some(prefix), None) => Ok(PathMatch::Prefix(prefix.clone())),
            (None, Some(path)) => Ok(PathMatch::Exact(path.clone())),
            (None, None) => Ok(PathMatch::default()),
        }
    }

    pub fn to_route_entry(&self) -> Result<RouteEntry> {
        let entry = RouteEntry::new(&self.name, self.path_match()?, &self.cluster);
        Ok(self
            .headers
            .iter()
            .fold(entry, |entry, header| entry.with_header(&header.name, &header.value)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMirroringRequest {
    #[validate(length(min = 1, message = "Route table name cannot be empty"))]
    pub route_table: String,

    /// With `route`, targets a virtual host sub-route instead of the table
    #[serde(default)]
    pub virtual_host: Option<String>,

    #[serde(default)]
    pub route: Option<String>,

    /// Mirror destination; not required to exist
    #[validate(length(min = 1, message = "Cluster name cannot be empty"))]
    pub cluster: String,

    /// Percentage of requests mirrored, passed through unchecked
    pub fraction: u32,
}

impl AddMirroringRequest {
    /// `(virtual_host, route)` when the mirror targets a sub-route
    pub fn route_target(&self) -> Result<Option<(&str, &str)>> {
        match (&self.virtual_host, &self.route) {
            (Some(vhost), Some(route)) => Ok(Some((vhost.as_str(), route.as_str()))),
            (None, None) => Ok(None),
            _ => Err(Error::validation_field(
                "virtualHost and route must be given together",
                "virtual_host",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListenerRequest {
    #[validate(length(min = 1, message = "Listener name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Address cannot be empty"))]
    pub address: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u32,

    /// May name a table that does not exist yet
    #[validate(length(min = 1, message = "Route table name cannot be empty"))]
    pub route_table: String,
}
