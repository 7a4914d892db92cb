//! Listener domain types

use serde::{Deserialize, Serialize};

use super::EntityState;

pub const TLS_INSPECTOR: &str = "envoy.filters.listener.tls_inspector";
pub const HTTP_INSPECTOR: &str = "envoy.filters.listener.http_inspector";

/// Bound address/port serving one route table.
///
/// The referenced route table may not exist yet; such a listener is kept in
/// the `disabled` state until the table gains content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub name: String,
    pub address: String,
    pub port: u32,
    pub route_table: String,
    pub state: EntityState,
}

impl Listener {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u32,
        route_table: impl Into<String>,
        state: EntityState,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            route_table: route_table.into(),
            state,
        }
    }

    /// Listener filters implied by the bind port
    pub fn listener_filters(&self) -> Vec<&'static str> {
        match self.port {
            443 => vec![TLS_INSPECTOR, HTTP_INSPECTOR],
            80 => vec![HTTP_INSPECTOR],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_filters_by_port() {
        let https = Listener::new("l1", "0.0.0.0", 443, "r1", EntityState::Enabled);
        assert_eq!(https.listener_filters(), vec![TLS_INSPECTOR, HTTP_INSPECTOR]);

        let http = Listener::new("l2", "0.0.0.0", 80, "r1", EntityState::Enabled);
        assert_eq!(http.listener_filters(), vec![HTTP_INSPECTOR]);

        let other = Listener::new("l3", "0.0.0.0", 10000, "r1", EntityState::Disabled);
        assert!(other.listener_filters().is_empty());
    }
}
