use std::fmt;
use std::sync::Arc;

use arcstr::ArcStr;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::agent::Agent;
use super::config::{ClientSettings, RouterClientConfig};
use super::error::ClientError;
use crate::connection::RouterConnection;
use crate::routing::{
	DispatchStats, DispatcherActor, DispatcherHandle, DispatcherSettings, Router,
};
use crate::transport::{InboundMessage, MqttTransport, TransportPtr};

/// Routing client: mounts routers and hands out agents.
///
/// Cloning is cheap, clones share one dispatcher and one transport.
/// Connection lifecycle is managed separately via [`RouterConnection`].
#[derive(Clone)]
pub struct RouterClient {
	transport: TransportPtr,
	dispatcher: DispatcherHandle,
	settings: Arc<ClientSettings>,
}

impl fmt::Debug for RouterClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouterClient")
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}

impl RouterClient {
	/// Connect to an MQTT broker with default settings.
	///
	/// Resolves once the broker acknowledged the connection. Keep the
	/// returned connection alive for the session duration and call
	/// `connection.shutdown()` when done.
	pub async fn connect(
		url: &str,
	) -> Result<(Self, RouterConnection), ClientError> {
		let config = RouterClientConfig::from_url(url)?;
		Self::connect_with_config(config).await
	}

	/// Connect to an MQTT broker with custom configuration
	pub async fn connect_with_config(
		config: RouterClientConfig,
	) -> Result<(Self, RouterConnection), ClientError> {
		config.settings.validate()?;
		let (transport, inbound, event_loop_handle) =
			MqttTransport::connect(config.connection, &config.settings).await?;
		Self::start(
			Arc::new(transport),
			inbound,
			config.settings,
			Some(event_loop_handle),
		)
	}

	/// Run the client over an already connected transport.
	///
	/// Must be called from within a tokio runtime.
	pub fn with_transport(
		transport: TransportPtr,
		inbound: Receiver<InboundMessage>,
		settings: ClientSettings,
	) -> Result<(Self, RouterConnection), ClientError> {
		settings.validate()?;
		Self::start(transport, inbound, settings, None)
	}

	fn start(
		transport: TransportPtr,
		inbound: Receiver<InboundMessage>,
		settings: ClientSettings,
		event_loop_handle: Option<JoinHandle<()>>,
	) -> Result<(Self, RouterConnection), ClientError> {
		let dispatcher_settings = DispatcherSettings {
			command_channel_capacity: settings.command_channel_capacity,
			dedup_retention: settings.dedup_retention,
			buffer_capacity: settings.buffer_capacity()?,
			buffer_ttl: settings.buffer_ttl,
			id_length: settings.correlation_id_length,
		};
		let (controller, dispatcher) = DispatcherActor::spawn(
			transport.clone(),
			inbound,
			dispatcher_settings,
		);
		let client = Self {
			transport: transport.clone(),
			dispatcher,
			settings: Arc::new(settings),
		};
		let connection =
			RouterConnection::new(transport, controller, event_loop_handle);
		Ok((client, connection))
	}

	/// Subscribes and registers every route of `router` under `prefix`.
	///
	/// Handlers are mounted before listeners, each in registration order.
	/// Buffered early arrivals matching a mounted route are replayed. The
	/// first failure is returned; routes mounted before it stay mounted.
	pub async fn mount(
		&self,
		prefix: &str,
		router: &Router,
	) -> Result<(), ClientError> {
		let handlers = router.mount_handlers(prefix)?;
		let listeners = router.mount_listeners(prefix)?;

		for route in handlers {
			let filter = route.subscription().clone();
			self.transport
				.subscribe(&filter, route.options.effective_qos())
				.await?;
			let replayed = self.dispatcher.mount_handler(route).await?;
			debug!(topic_pattern = %filter, replayed, "Handler mounted");
		}
		for route in listeners {
			let filter = route.subscription().clone();
			self.transport
				.subscribe(&filter, route.options.effective_qos())
				.await?;
			let replayed = self.dispatcher.mount_listener(route).await?;
			debug!(topic_pattern = %filter, replayed, "Listener mounted");
		}
		info!(prefix, routes = router.routes().len(), "Router mounted");
		Ok(())
	}

	/// Agent bound to `route`; its topics resolve to `route/<topic>`.
	pub fn agent(&self, route: impl Into<ArcStr>) -> Agent {
		Agent::new(self.clone(), Some(route.into()))
	}

	/// Agent whose topics are used as given.
	pub fn root_agent(&self) -> Agent {
		Agent::new(self.clone(), None)
	}

	/// Sizes of the dispatcher registries.
	pub async fn stats(&self) -> Result<DispatchStats, ClientError> {
		Ok(self.dispatcher.stats().await?)
	}

	pub fn settings(&self) -> &ClientSettings {
		&self.settings
	}

	pub(crate) fn transport(&self) -> &TransportPtr {
		&self.transport
	}

	pub(crate) fn dispatcher(&self) -> &DispatcherHandle {
		&self.dispatcher
	}
}
