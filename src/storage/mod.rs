//! # Entity Storage
//!
//! In-memory storage for the configuration core. There is no persistence:
//! state lives for the lifetime of the owning
//! [`crate::services::ConfigurationService`] and is repopulated on restart by
//! replaying administrative requests (see [`crate::startup`]).

pub mod entity_store;

pub use entity_store::{EndpointUpsert, EntityStore};

/// Resource type labels used in `AlreadyExists` / `NotFound` errors
pub mod kind {
    pub const CLUSTER: &str = "cluster";
    pub const ENDPOINT: &str = "endpoint";
    pub const ROUTE_TABLE: &str = "route table";
    pub const VIRTUAL_HOST: &str = "virtual host";
    pub const ROUTE: &str = "route";
    pub const LISTENER: &str = "listener";
}
