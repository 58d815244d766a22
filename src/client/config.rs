//! Configuration for router client initialization

use std::num::NonZeroUsize;
use std::time::Duration;

use rumqttc::{MqttOptions, OptionError};

use super::error::ClientError;

/// Client-level behavior settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// Capacity of the rumqttc request channel
	pub event_loop_capacity: usize,
	/// Capacity of the dispatcher command channel
	pub command_channel_capacity: usize,
	/// Capacity of the transport-to-dispatcher delivery channel
	pub inbound_channel_capacity: usize,
	/// How long `connect` waits for the broker's ConnAck
	pub connection_timeout_millis: u64,
	/// Retention window of the duplicate-suppression set
	pub dedup_retention: Duration,
	/// Default wait of `invoke_async`
	pub invoke_timeout: Duration,
	/// Maximum number of buffered early arrivals (must be > 0)
	pub buffer_capacity: usize,
	/// Lifetime of a buffered early arrival
	pub buffer_ttl: Duration,
	/// Length of generated correlation ids (must be > 0)
	pub correlation_id_length: usize,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			event_loop_capacity: 10,
			command_channel_capacity: 100,
			inbound_channel_capacity: 100,
			connection_timeout_millis: 5000,
			dedup_retention: crate::routing::dedup::DEFAULT_RETENTION,
			invoke_timeout: Duration::from_millis(5000),
			buffer_capacity: crate::routing::buffer::DEFAULT_CAPACITY,
			buffer_ttl: crate::routing::buffer::DEFAULT_TTL,
			correlation_id_length: crate::envelope::DEFAULT_ID_LENGTH,
		}
	}
}

impl ClientSettings {
	/// Rejects zero capacities and lengths.
	pub fn validate(&self) -> Result<(), ClientError> {
		let non_zero = [
			("event_loop_capacity", self.event_loop_capacity),
			("command_channel_capacity", self.command_channel_capacity),
			("inbound_channel_capacity", self.inbound_channel_capacity),
			("buffer_capacity", self.buffer_capacity),
			("correlation_id_length", self.correlation_id_length),
		];
		if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
			return Err(ClientError::ConfigurationValue(format!(
				"{name} must be greater than 0"
			)));
		}
		Ok(())
	}

	pub(crate) fn buffer_capacity(&self) -> Result<NonZeroUsize, ClientError> {
		NonZeroUsize::new(self.buffer_capacity).ok_or_else(|| {
			ClientError::ConfigurationValue(
				"buffer_capacity must be greater than 0".to_string(),
			)
		})
	}
}

/// Configuration for router client creation
#[derive(Debug, Clone)]
pub struct RouterClientConfig {
	/// Underlying MQTT connection options (from rumqttc)
	pub connection: MqttOptions,
	/// Client-level behavior settings
	pub settings: ClientSettings,
}

impl RouterClientConfig {
	/// Create config with default settings
	///
	/// ```rust
	/// use mqtt_rpc_router::RouterClientConfig;
	///
	/// let config = RouterClientConfig::new("vending_01", "localhost", 1883);
	/// assert_eq!(config.settings.correlation_id_length, 10);
	/// ```
	pub fn new(client_id: &str, host: &str, port: u16) -> Self {
		Self {
			connection: MqttOptions::new(client_id, host, port),
			settings: ClientSettings::default(),
		}
	}

	/// Parse configuration from MQTT URL
	///
	/// Supports: tcp://, mqtt://, ssl://, mqtts://, ws://, wss://
	pub fn from_url(url: &str) -> Result<Self, OptionError> {
		Ok(Self {
			connection: MqttOptions::parse_url(url)?,
			settings: ClientSettings::default(),
		})
	}

	/// Create config for localhost:1883
	pub fn localhost(client_id: &str) -> Self {
		Self::new(client_id, "localhost", 1883)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_zero_capacity_rejected() {
		let settings = ClientSettings {
			buffer_capacity: 0,
			..ClientSettings::default()
		};
		assert!(matches!(
			settings.validate(),
			Err(ClientError::ConfigurationValue(msg)) if msg.contains("buffer_capacity")
		));
		assert!(ClientSettings::default().validate().is_ok());
	}

	#[test]
	fn test_from_url_requires_client_id() {
		assert!(RouterClientConfig::from_url("mqtt://localhost:1883").is_err());
		let config =
			RouterClientConfig::from_url("mqtt://localhost:1883?client_id=router")
				.unwrap();
		assert_eq!(config.connection.client_id(), "router");
	}
}
