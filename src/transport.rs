//! Pub/sub transport capability
//!
//! The dispatcher only needs `publish`, `subscribe`, `unsubscribe` and an
//! inbound channel of `(topic, bytes)`. [`MqttTransport`] talks to a real
//! broker, [`MemoryBroker`] keeps everything in process.

use std::sync::Arc;

use arcstr::ArcStr;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::QoS;
use thiserror::Error;

use crate::topic::TopicPatternError;

pub mod memory;
pub mod mqtt;

pub use memory::{MemoryBroker, MemoryTransport};
pub use mqtt::MqttTransport;

/// Raw delivery handed from the transport to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
	pub topic: ArcStr,
	pub payload: Bytes,
}

/// Per-publish delivery settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
	pub qos: QoS,
	pub retain: bool,
}

impl Default for PublishOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtLeastOnce,
			retain: false,
		}
	}
}

/// Errors reported by transports
#[derive(Debug, Error)]
pub enum TransportError {
	/// Request could not be queued on the MQTT client
	#[error("MQTT client error: {0}")]
	Client(#[from] rumqttc::ClientError),

	/// Transport was disconnected
	#[error("Transport is closed")]
	Closed,

	/// Subscription filter rejected by the transport
	#[error("Invalid subscription filter: {0}")]
	InvalidFilter(#[from] TopicPatternError),
}

/// Capability the dispatcher and agents publish and subscribe through.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Publishes `payload` on a concrete topic.
	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		options: PublishOptions,
	) -> Result<(), TransportError>;

	/// Subscribes to a wildcard filter.
	async fn subscribe(&self, filter: &str, qos: QoS)
	-> Result<(), TransportError>;

	/// Drops a subscription made with [`Transport::subscribe`].
	async fn unsubscribe(&self, filter: &str) -> Result<(), TransportError>;

	/// Closes the connection; inbound deliveries stop.
	async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Shared transport handle
pub type TransportPtr = Arc<dyn Transport>;
