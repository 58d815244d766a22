use std::time::Duration;

use arcstr::ArcStr;
use rumqttc::QoS;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::async_client::RouterClient;
use super::error::ClientError;
use super::pending_response::PendingResponse;
use crate::envelope::{Envelope, to_data};
use crate::topic::protocol::{self, correlated, request_topic, response_topic};
use crate::topic::validation::validate_publish_topic;
use crate::transport::PublishOptions;

/// Per-call overrides for [`Agent::invoke_async_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeOptions {
	/// Delivery of the request publish
	pub publish: Option<PublishOptions>,
	/// QoS of the correlation topic subscription
	pub subscribe_qos: Option<QoS>,
	/// How long to wait for the reply
	pub timeout: Option<Duration>,
}

impl InvokeOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn publish(mut self, options: PublishOptions) -> Self {
		self.publish = Some(options);
		self
	}

	pub fn subscribe_qos(mut self, qos: QoS) -> Self {
		self.subscribe_qos = Some(qos);
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}
}

/// Route-scoped publishing and invocation facade.
///
/// Topics are resolved against the bound route: an agent bound to `wifi`
/// publishes `scan/start` on `wifi/scan/start`.
#[derive(Debug, Clone)]
pub struct Agent {
	client: RouterClient,
	route: Option<ArcStr>,
	publish_defaults: PublishOptions,
	subscribe_qos: QoS,
}

impl Agent {
	pub(crate) fn new(client: RouterClient, route: Option<ArcStr>) -> Self {
		Self {
			client,
			route: route.filter(|r| !r.is_empty()),
			publish_defaults: PublishOptions::default(),
			subscribe_qos: QoS::AtLeastOnce,
		}
	}

	/// Agent nested under this one, inheriting its defaults.
	pub fn child(&self, route: &str) -> Agent {
		let route = match &self.route {
			| Some(parent) => protocol::join(parent, route),
			| None => route.to_string(),
		};
		Self {
			route: Some(ArcStr::from(route)).filter(|r| !r.is_empty()),
			..self.clone()
		}
	}

	pub fn with_publish_options(mut self, options: PublishOptions) -> Self {
		self.publish_defaults = options;
		self
	}

	/// QoS used for correlation topic subscriptions.
	pub fn with_subscribe_options(mut self, qos: QoS) -> Self {
		self.subscribe_qos = qos;
		self
	}

	pub fn route(&self) -> Option<&str> {
		self.route.as_deref()
	}

	/// `route/topic`, or `topic` for an unbound agent.
	pub fn full_topic(&self, topic: &str) -> String {
		protocol::full_topic(topic, self.route.as_deref())
	}

	/// Fire-and-forget publication of `data` on `route/topic`.
	pub async fn publish<T: Serialize + ?Sized>(
		&self,
		topic: &str,
		data: &T,
	) -> Result<(), ClientError> {
		self.publish_with(topic, data, self.publish_defaults).await
	}

	pub async fn publish_with<T: Serialize + ?Sized>(
		&self,
		topic: &str,
		data: &T,
		options: PublishOptions,
	) -> Result<(), ClientError> {
		let full_topic = self.full_topic(topic);
		validate_publish_topic(&full_topic)?;
		let envelope = self.envelope(data)?;
		self.send(&full_topic, &envelope, options).await
	}

	/// Publishes an invocation request without waiting for the reply.
	pub async fn invoke<T: Serialize + ?Sized>(
		&self,
		topic: &str,
		data: &T,
	) -> Result<(), ClientError> {
		self.invoke_with(topic, data, self.publish_defaults).await
	}

	pub async fn invoke_with<T: Serialize + ?Sized>(
		&self,
		topic: &str,
		data: &T,
		options: PublishOptions,
	) -> Result<(), ClientError> {
		let full_topic = self.full_topic(topic);
		validate_publish_topic(&full_topic)?;
		let envelope = self.envelope(data)?;
		self.send(&request_topic(&full_topic), &envelope, options)
			.await
	}

	/// Invokes the handler serving `route/topic` and returns its reply.
	///
	/// Fails with [`ClientError::InvocationTimeout`] when no reply arrives
	/// within the client's `invoke_timeout`.
	pub async fn invoke_async<R, T>(
		&self,
		topic: &str,
		data: &T,
	) -> Result<R, ClientError>
	where
		R: DeserializeOwned,
		T: Serialize + ?Sized,
	{
		self.invoke_async_with(topic, data, InvokeOptions::default())
			.await
	}

	pub async fn invoke_async_with<R, T>(
		&self,
		topic: &str,
		data: &T,
		options: InvokeOptions,
	) -> Result<R, ClientError>
	where
		R: DeserializeOwned,
		T: Serialize + ?Sized,
	{
		let full_topic = self.full_topic(topic);
		validate_publish_topic(&full_topic)?;
		let envelope = self.envelope(data)?;
		let reply_topic =
			ArcStr::from(correlated(&response_topic(&full_topic), &envelope.id));
		let timeout = options.timeout.unwrap_or(self.client.settings().invoke_timeout);

		let pending = PendingResponse::open(
			self.client.transport(),
			self.client.dispatcher(),
			reply_topic,
			options.subscribe_qos.unwrap_or(self.subscribe_qos),
		)
		.await?;
		self.send(
			&request_topic(&full_topic),
			&envelope,
			options.publish.unwrap_or(self.publish_defaults),
		)
		.await?;

		let reply = pending.wait(timeout, &full_topic).await?;
		reply.data_as().map_err(ClientError::ReplyData)
	}

	fn envelope<T: Serialize + ?Sized>(
		&self,
		data: &T,
	) -> Result<Envelope, ClientError> {
		Ok(Envelope::mark_with_id_length(
			to_data(data)?,
			self.client.settings().correlation_id_length,
		))
	}

	async fn send(
		&self,
		topic: &str,
		envelope: &Envelope,
		options: PublishOptions,
	) -> Result<(), ClientError> {
		let payload = envelope.encode()?;
		self.client
			.transport()
			.publish(topic, payload, options)
			.await?;
		debug!(topic = %topic, id = %envelope.id, "Published");
		Ok(())
	}
}
