//! Message routing and dispatch module
//!
//! Routers describe which callbacks serve which topic patterns. The
//! dispatcher owns the mounted routes and every other registry, and turns
//! inbound deliveries into listener calls, handler replies and resolved
//! invocations.

pub mod buffer;
mod debounce;
pub mod dedup;
pub(crate) mod dispatcher;
mod lane;
/// Routing error types
pub mod error;
/// Composable route collections
pub mod router;

// Re-export commonly used types for convenience
pub use dispatcher::DispatchStats;
pub use error::DispatchError;
pub use router::{
	Callback, HandlerError, HandlerFn, ListenerFn, MountedRoute, Publication,
	Route, RouteOptions, Router,
};

// Re-export for internal crate usage only
pub(crate) use dispatcher::{
	DispatcherActor, DispatcherController, DispatcherHandle, DispatcherSettings,
};
