//! Business logic layer
//!
//! [`ConfigurationService`] is the only owner of the entity store; every
//! caller goes through it.

pub mod configuration_service;

pub use configuration_service::{
    Applied, ClusterStatus, ConfigurationService, ConfigurationStatus, EndpointStatus,
    ListenerStatus, PublishOutcome, RouteTableStatus, VirtualHostStatus,
};
