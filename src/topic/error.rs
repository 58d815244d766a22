//! Error types and utilities for the topic module

use thiserror::Error;

use super::pattern_segment::TopicPatternError;

/// Comprehensive error type for topic-related operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Route pattern parsing or validation error
	#[error("Topic pattern error: {0}")]
	Pattern(#[from] TopicPatternError),

	/// Concrete topic can not be used for publishing
	#[error("Topic '{topic}' is invalid for publishing: {reason}")]
	InvalidTopic {
		/// Offending topic
		topic: String,
		/// What is wrong with it
		reason: String,
	},
}

impl TopicError {
	/// Creates a new InvalidTopic error
	pub fn invalid_topic(
		topic: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::InvalidTopic {
			topic: topic.into(),
			reason: reason.into(),
		}
	}
}

/// Topic processing limits and constants
pub mod limits {
	/// Maximum topic length accepted by MQTT
	pub const MAX_TOPIC_LENGTH: usize = 65535;
}

/// Validation utilities for topic operations
pub mod validation {
	use super::TopicError;
	use super::limits::MAX_TOPIC_LENGTH;

	/// Validates a concrete topic before it is published.
	pub fn validate_publish_topic(topic: &str) -> Result<(), TopicError> {
		if topic.is_empty() || topic.len() > MAX_TOPIC_LENGTH {
			return Err(TopicError::invalid_topic(
				topic,
				"Topic is empty or too long",
			));
		}
		if topic.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
			return Err(TopicError::invalid_topic(
				topic,
				"Topic contains illegal characters ('#', '+', or null byte)",
			));
		}
		if topic.split('/').any(|s| s.starts_with(':')) {
			return Err(TopicError::invalid_topic(
				topic,
				"Topic contains an unbound ':name' parameter",
			));
		}
		Ok(())
	}

}
