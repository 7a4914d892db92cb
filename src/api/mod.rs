//! Administrative request types
//!
//! The transport that accepts these requests lives outside this crate; the
//! core only defines their shape and validation.

pub mod dto;

pub use dto::{
    AddEndpointRequest, AddMirroringRequest, AddRouteRequest, AddVirtualHostRequest,
    ChangeRequest, CreateClusterRequest, CreateListenerRequest, CreateRouteTableRequest,
    EndpointRefRequest, EndpointSwitch, HeaderMatchDto, SwitchEndpointRequest,
};
