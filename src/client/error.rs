use rumqttc::OptionError;

use crate::envelope::EnvelopeError;
use crate::routing::DispatchError;
use crate::topic::{TopicError, TopicPatternError};
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionEstablishmentError {
	#[error("Network connection failed: {0}")]
	Network(#[from] rumqttc::ConnectionError),

	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected { code: rumqttc::ConnectReturnCode },

	#[error("Connection establishment timed out after {timeout_millis}ms")]
	Timeout { timeout_millis: u64 },
}

/// Errors that can occur in router client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	/// Publish, subscribe or unsubscribe failed on the transport
	#[error("Transport error: {0}")]
	Transport(#[from] TransportError),

	/// Configuration errors when parsing MQTT options
	#[error("Configuration error: {0}")]
	Configuration(#[from] OptionError),

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Payload could not be enveloped or decoded
	#[error("Envelope error: {0}")]
	Envelope(#[from] EnvelopeError),

	/// Reply data does not have the expected shape
	#[error("Reply deserialization failed: {0}")]
	ReplyData(#[source] serde_json::Error),

	/// Dispatcher task is not reachable
	#[error("Dispatch error: {0}")]
	Dispatch(#[from] DispatchError),

	/// Route pattern errors
	#[error("Topic pattern error: {0}")]
	TopicPattern(#[from] TopicPatternError),

	/// Concrete topic can not be published to
	#[error("Topic error: {0}")]
	Topic(#[from] TopicError),

	/// No reply arrived on the correlation topic in time
	#[error("Invocation of '{topic}' timed out after {timeout_millis}ms")]
	InvocationTimeout { topic: String, timeout_millis: u64 },

	/// Connection establishment failed
	#[error("Failed to establish connection: {0}")]
	ConnectionEstablishment(#[from] ConnectionEstablishmentError),
}
