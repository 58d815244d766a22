//! # MQTT RPC Router
//!
//! Pattern-based routing and request/response correlation on top of an MQTT
//! style publish/subscribe transport.
//!
//! ## Features
//!
//! - **Route patterns**: `:name` parameters next to MQTT `+` and `#` wildcards
//! - **Composable routers**: mount sub-routers under topic prefixes
//! - **Remote invocation**: `invoke_async` publishes on `__req/<topic>` and
//!   awaits the reply on `__res/<topic>/<id>`
//! - **At-least-once friendly**: duplicate deliveries are suppressed inside a
//!   retention window
//! - **Early arrivals**: messages that beat their route's mount are buffered
//!   and replayed
//! - **Debounced listeners**: fire once per quiet period with the latest data
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt_rpc_router::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (client, connection) =
//!         RouterClient::connect("mqtt://localhost:1883?client_id=vending").await?;
//!
//!     let mut router = Router::new();
//!     router.handle("cmd/reboot", |p: Publication| async move {
//!         let delay: u64 = p.data_as()?;
//!         Ok::<_, HandlerError>(delay + 200)
//!     });
//!     client.mount("server/main", &router).await?;
//!
//!     let agent = client.agent("server/main");
//!     let reply: u64 = agent.invoke_async("cmd/reboot", &100).await?;
//!     assert_eq!(reply, 300);
//!
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod client;
pub mod connection;
pub mod envelope;
pub mod routing;
pub mod topic;
pub mod transport;

// === Core Public API ===
pub use client::{
	Agent, ClientError, ClientSettings, InvokeOptions, RouterClient,
	RouterClientConfig,
};
pub use connection::RouterConnection;
pub use envelope::{Envelope, EnvelopeError, ParsedMessage};
pub use routing::{
	DispatchStats, HandlerError, Publication, RouteOptions, Router,
};
pub use topic::{TopicParams, TopicPattern, TopicPatternError};
pub use transport::{
	InboundMessage, MemoryBroker, MemoryTransport, MqttTransport,
	PublishOptions, Transport, TransportError, TransportPtr,
};

// Essential external types
pub use rumqttc::QoS;

/// Result type alias for operations that may fail with ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_rpc_router::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most applications

	pub use crate::{
		Agent, ClientError, HandlerError, InvokeOptions, Publication, QoS,
		Result, RouteOptions, Router, RouterClient, RouterClientConfig,
		RouterConnection,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_rpc_router::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::client::{ClientError, ConnectionEstablishmentError};
	pub use crate::envelope::EnvelopeError;
	pub use crate::routing::{DispatchError, HandlerError};
	pub use crate::topic::{TopicError, TopicPatternError};
	pub use crate::transport::TransportError;
}
