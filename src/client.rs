//! Router client module
//!
//! This module provides the client that mounts routers on a transport, the
//! route-scoped agents used for publishing and invoking, and their
//! configuration.

/// Route-scoped publish and invoke facade
pub mod agent;
/// Router client implementation
pub mod async_client;
pub mod config;
/// Client error types
pub mod error;
mod pending_response;

// Re-export commonly used types for convenience
pub use agent::{Agent, InvokeOptions};
pub use async_client::RouterClient;
pub use config::{ClientSettings, RouterClientConfig};
pub use error::{ClientError, ConnectionEstablishmentError};

// Connection type is available from the root level
// Use: mqtt_rpc_router::RouterConnection
