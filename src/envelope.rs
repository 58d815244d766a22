//! Message envelope carried by every publication
//!
//! Wire form is UTF-8 JSON: `{"id": string, "time": number, "data"?: any}`.

use std::time::{SystemTime, UNIX_EPOCH};

use arcstr::ArcStr;
use bytes::Bytes;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default length of generated correlation ids
pub const DEFAULT_ID_LENGTH: usize = 10;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Errors from encoding or decoding envelopes
#[derive(Debug, Error)]
pub enum EnvelopeError {
	/// Inbound bytes are not a well-formed envelope
	#[error("Malformed payload: {0}")]
	MalformedPayload(#[source] serde_json::Error),

	/// Outbound data could not be converted to JSON
	#[error("Serialization error: {0}")]
	Serialization(#[source] serde_json::Error),
}

/// `{id, time, data}` wrapper around application data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// Correlation id, fresh for every outbound message
	pub id: String,
	/// Creation time in milliseconds since the UNIX epoch
	#[serde(default)]
	pub time: u64,
	/// Application payload
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl Envelope {
	/// Wraps `data` with a fresh id and the current time.
	pub fn mark(data: Option<Value>) -> Self {
		Self::mark_with_id_length(data, DEFAULT_ID_LENGTH)
	}

	/// Same as [`Envelope::mark`] with a custom id length.
	pub fn mark_with_id_length(data: Option<Value>, id_length: usize) -> Self {
		Self {
			id: fresh_id(id_length),
			time: now_millis(),
			data,
		}
	}

	/// Serializes the envelope to JSON bytes.
	pub fn encode(&self) -> Result<Bytes, EnvelopeError> {
		serde_json::to_vec(self)
			.map(Bytes::from)
			.map_err(EnvelopeError::Serialization)
	}

	/// Parses an envelope from raw transport bytes.
	pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
		serde_json::from_slice(bytes).map_err(EnvelopeError::MalformedPayload)
	}

	/// Deserializes `data` into `T`; an absent payload reads as `null`.
	pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		data_as(self.data.clone())
	}
}

/// Converts a serializable value into envelope data; `null` becomes absent.
pub fn to_data<T: Serialize + ?Sized>(
	data: &T,
) -> Result<Option<Value>, EnvelopeError> {
	match serde_json::to_value(data).map_err(EnvelopeError::Serialization)? {
		| Value::Null => Ok(None),
		| value => Ok(Some(value)),
	}
}

pub(crate) fn data_as<T: DeserializeOwned>(
	data: Option<Value>,
) -> Result<T, serde_json::Error> {
	serde_json::from_value(data.unwrap_or(Value::Null))
}

/// Random lowercase alphanumeric id.
pub fn fresh_id(length: usize) -> String {
	let mut rng = rand::rng();
	(0 .. length)
		.map(|_| ID_ALPHABET[rng.random_range(0 .. ID_ALPHABET.len())] as char)
		.collect()
}

fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}

/// Inbound delivery after envelope decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
	/// Concrete topic the message arrived on
	pub topic: ArcStr,
	/// Decoded envelope
	pub payload: Envelope,
}

impl ParsedMessage {
	/// Structural identity of `(topic, envelope)` used for deduplication.
	pub fn key(&self) -> MessageKey {
		MessageKey {
			topic: self.topic.clone(),
			// Value maps are ordered, so the re-encoded form is canonical.
			envelope: serde_json::to_string(&self.payload).unwrap_or_default(),
		}
	}
}

/// Hashable identity of a [`ParsedMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey {
	topic: ArcStr,
	envelope: String,
}

impl MessageKey {
	/// Topic part of the key
	pub fn topic(&self) -> &ArcStr {
		&self.topic
	}
}
