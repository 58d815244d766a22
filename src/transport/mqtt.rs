use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{AsyncClient, ConnAck, ConnectReturnCode, EventLoop, MqttOptions, QoS};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::{InboundMessage, PublishOptions, Transport, TransportError};
use crate::client::ClientSettings;
use crate::client::error::ConnectionEstablishmentError;

type Filters = Arc<Mutex<HashMap<String, QoS>>>;

/// Transport over a rumqttc client and its event loop task.
#[derive(Clone)]
pub struct MqttTransport {
	client: AsyncClient,
	filters: Filters,
}

impl MqttTransport {
	/// Connects and waits for the broker's ConnAck.
	///
	/// Returns the transport, the inbound delivery channel and the event
	/// loop task, which ends after a Disconnect.
	pub async fn connect(
		options: MqttOptions,
		settings: &ClientSettings,
	) -> Result<
		(Self, mpsc::Receiver<InboundMessage>, JoinHandle<()>),
		ConnectionEstablishmentError,
	> {
		let (client, new_event_loop) =
			AsyncClient::new(options, settings.event_loop_capacity);

		let timeout_millis = settings.connection_timeout_millis;
		let connected_event_loop = time::timeout(
			Duration::from_millis(timeout_millis),
			Self::establish_connection(new_event_loop),
		)
		.await
		.map_err(|_| ConnectionEstablishmentError::Timeout { timeout_millis })??;

		let (inbound_tx, inbound_rx) =
			mpsc::channel(settings.inbound_channel_capacity);
		let transport = Self {
			client,
			filters: Arc::new(Mutex::new(HashMap::new())),
		};
		let event_loop_transport = transport.clone();
		let event_loop_handle = tokio::spawn(async move {
			event_loop_transport.run(connected_event_loop, inbound_tx).await;
		});
		Ok((transport, inbound_rx, event_loop_handle))
	}

	async fn establish_connection(
		mut event_loop: EventLoop,
	) -> Result<EventLoop, ConnectionEstablishmentError> {
		loop {
			match event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ConnAck {
					code,
					session_present,
				}))) => {
					if code == ConnectReturnCode::Success {
						info!(session_present, "MQTT connection established");
						return Ok(event_loop);
					}
					debug!(code = ?code, "MQTT connection rejected by broker");
					return Err(ConnectionEstablishmentError::BrokerRejected {
						code,
					});
				}
				| Ok(notification) => {
					debug!(notification = ?notification, "Bootstrap phase notification");
				}
				| Err(connection_err) => {
					debug!(error = %connection_err, "MQTT connection error during bootstrap phase");
					return Err(ConnectionEstablishmentError::Network(
						connection_err,
					));
				}
			}
		}
	}

	/// Forwards publishes until a Disconnect packet goes either way.
	async fn run(
		self,
		mut event_loop: EventLoop,
		inbound_tx: mpsc::Sender<InboundMessage>,
	) {
		let mut error_count = 0;
		const MAX_CONSECUTIVE_ERRORS: u32 = 10;
		const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
		const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

		loop {
			match event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ConnAck {
					session_present: false,
					code: ConnectReturnCode::Success,
				}))) => {
					error_count = 0;
					info!("MQTT reconnected without session, resubscribing");
					// The event loop must keep polling for subscribe requests to drain.
					tokio::spawn(self.clone().resubscribe_all());
				}
				| Ok(Incoming(Packet::ConnAck(ConnAck {
					session_present: true,
					code: ConnectReturnCode::Success,
				}))) => {
					error_count = 0;
					info!("MQTT reconnected with session preserved");
				}
				| Ok(Incoming(Publish(p))) => {
					error_count = 0;
					debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");

					let message = InboundMessage {
						topic: ArcStr::from(p.topic),
						payload: p.payload,
					};
					if inbound_tx.send(message).await.is_err() {
						warn!("Dispatcher is gone, inbound message dropped");
					}
				}
				| Ok(Incoming(Disconnect)) => {
					info!("Received MQTT Disconnect packet from server");
					break;
				}
				| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
					info!("Sent MQTT Disconnect packet to server");
					break;
				}
				| Ok(notification) => {
					error_count = 0;
					debug!(notification = ?notification, "Received MQTT notification");
				}
				| Err(err) => {
					error_count += 1;
					error!(error_count = error_count, error = %err, "MQTT event loop error");

					if error_count >= MAX_CONSECUTIVE_ERRORS {
						error!(
							error_count = error_count,
							max_errors = MAX_CONSECUTIVE_ERRORS,
							"Too many consecutive errors, terminating event \
							 loop"
						);
						break;
					}

					let delay = INITIAL_RETRY_DELAY
						* 2_u32.pow((error_count - 1).min(10));
					let delay = delay.min(MAX_RETRY_DELAY);

					warn!(delay = ?delay, error_count = error_count, "Retrying MQTT connection");
					time::sleep(delay).await;
				}
			}
		}
		info!("MQTT event loop terminated");
	}

	async fn resubscribe_all(self) {
		let filters: Vec<(String, QoS)> = self
			.filters
			.lock()
			.await
			.iter()
			.map(|(filter, qos)| (filter.clone(), *qos))
			.collect();
		for (filter, qos) in filters {
			if let Err(err) = self.client.subscribe(filter.clone(), qos).await {
				error!(topic_pattern = %filter, error = %err, "Failed to resubscribe");
			}
		}
	}
}

#[async_trait]
impl Transport for MqttTransport {
	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		options: PublishOptions,
	) -> Result<(), TransportError> {
		self.client
			.publish_bytes(topic, options.qos, options.retain, payload)
			.await?;
		Ok(())
	}

	async fn subscribe(
		&self,
		filter: &str,
		qos: QoS,
	) -> Result<(), TransportError> {
		self.client.subscribe(filter, qos).await?;
		self.filters.lock().await.insert(filter.to_string(), qos);
		Ok(())
	}

	async fn unsubscribe(&self, filter: &str) -> Result<(), TransportError> {
		self.filters.lock().await.remove(filter);
		self.client.unsubscribe(filter).await?;
		Ok(())
	}

	async fn disconnect(&self) -> Result<(), TransportError> {
		self.client.disconnect().await?;
		Ok(())
	}
}
