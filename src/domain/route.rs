//! Route domain types
//!
//! A route table is either a direct cluster target (the simple variant) or a
//! set of virtual hosts, each holding named sub-routes. Both forms may carry
//! mirroring policies mapping a destination cluster to a sampling fraction.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Named route table consumed by listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    pub name: String,

    /// Direct cluster target (simple variant)
    pub cluster: Option<String>,

    pub virtual_hosts: HashMap<String, VirtualHost>,

    /// Names of listeners currently bound to this table
    pub assignments: HashSet<String>,

    /// Table-level mirroring for the direct cluster target: cluster -> fraction
    pub mirroring: HashMap<String, u32>,
}

impl RouteTable {
    /// Create an empty route table, optionally with a direct cluster target
    pub fn new(name: impl Into<String>, cluster: Option<String>) -> Self {
        Self {
            name: name.into(),
            cluster,
            virtual_hosts: HashMap::new(),
            assignments: HashSet::new(),
            mirroring: HashMap::new(),
        }
    }

    /// At least one virtual host or a direct cluster target
    pub fn has_content(&self) -> bool {
        self.cluster.is_some() || !self.virtual_hosts.is_empty()
    }

    /// Content and at least one listener assignment; only usable tables are emitted
    pub fn is_usable(&self) -> bool {
        self.has_content() && !self.assignments.is_empty()
    }

    pub fn virtual_host(&self, name: &str) -> Option<&VirtualHost> {
        self.virtual_hosts.get(name)
    }
}

/// Virtual host "type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VirtualHostKind {
    #[default]
    Http,
    Https,
}

/// Certificate and key locators for TLS termination. Never the material itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsTermination {
    pub cert_chain_file: String,
    pub private_key_file: String,
}

/// Domain-scoped grouping of routes within a route table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualHost {
    pub name: String,
    pub kind: VirtualHostKind,
    pub domains: Vec<String>,
    pub tls: Option<TlsTermination>,

    /// Reject plain-text requests for this host
    pub tls_only: bool,

    pub routes: HashMap<String, RouteEntry>,
}

impl VirtualHost {
    /// Create a plain HTTP virtual host with no routes
    pub fn new(name: impl Into<String>, domains: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: VirtualHostKind::Http,
            domains,
            tls: None,
            tls_only: false,
            routes: HashMap::new(),
        }
    }

    /// Attach TLS termination material; the host becomes `https`
    pub fn with_tls(mut self, tls: TlsTermination, tls_only: bool) -> Self {
        self.tls = Some(tls);
        self.tls_only = tls_only;
        self.kind = VirtualHostKind::Https;
        self
    }

    pub fn with_route(mut self, route: RouteEntry) -> Self {
        self.routes.insert(route.name.clone(), route);
        self
    }

    pub fn route(&self, name: &str) -> Option<&RouteEntry> {
        self.routes.get(name)
    }
}

/// Path matching for a sub-route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatch {
    Prefix(String),
    Exact(String),
}

impl Default for PathMatch {
    fn default() -> Self {
        PathMatch::Prefix("/".to_string())
    }
}

/// Exact-value header match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMatch {
    pub name: String,
    pub value: String,
}

/// Named sub-route of a virtual host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub name: String,
    pub path: PathMatch,
    pub headers: Vec<HeaderMatch>,
    pub cluster: String,

    /// cluster -> fraction, passed through verbatim
    pub mirroring: HashMap<String, u32>,
}

impl RouteEntry {
    /// Create a sub-route matching `path` and forwarding to `cluster`
    pub fn new(name: impl Into<String>, path: PathMatch, cluster: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path,
            headers: Vec::new(),
            cluster: cluster.into(),
            mirroring: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderMatch { name: name.into(), value: value.into() });
        self
    }
}
