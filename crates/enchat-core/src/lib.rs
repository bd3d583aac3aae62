//! EnChat Core
//!
//! Shared vocabulary for the EnChat offline gateway: the error type,
//! gateway configuration, request/response snapshots and the port traits
//! that connect the gateway to the network, the pages it serves and the
//! offline action queue.

pub mod config;
pub mod error;
pub mod http;
pub mod ids;
pub mod ports;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use http::{GatewayRequest, GatewayResponse};
pub use ids::*;
