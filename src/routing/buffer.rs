use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::envelope::{MessageKey, ParsedMessage};
use crate::topic::{TopicClass, TopicPath, TopicPattern};

/// Default number of buffered early arrivals
pub const DEFAULT_CAPACITY: usize = 256;
/// Default lifetime of a buffered early arrival
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Message that matched no route when it arrived.
#[derive(Debug, Clone)]
pub struct BufferedMessage {
	pub message: ParsedMessage,
	pub class: TopicClass,
	pub topic: TopicPath,
	arrived: Instant,
}

/// Bounded store of early arrivals, replayed when a matching route mounts.
///
/// Oldest entries are evicted first once `capacity` is reached; entries older
/// than `ttl` are dropped on access.
pub struct EarlyArrivalBuffer {
	entries: LruCache<MessageKey, BufferedMessage>,
	ttl: Duration,
}

impl EarlyArrivalBuffer {
	pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
		Self {
			entries: LruCache::new(capacity),
			ttl,
		}
	}

	/// Stores `message` keyed by its structural identity.
	///
	/// Returns false when an identical message is already buffered.
	pub fn insert(
		&mut self,
		key: MessageKey,
		message: ParsedMessage,
		class: TopicClass,
		topic: TopicPath,
	) -> bool {
		self.purge_expired();
		if self.entries.contains(&key) {
			return false;
		}
		let buffered = BufferedMessage {
			message,
			class,
			topic,
			arrived: Instant::now(),
		};
		if let Some((evicted, _)) = self.entries.push(key, buffered) {
			warn!(
				topic = %evicted.topic(),
				capacity = self.entries.cap().get(),
				"Early-arrival buffer full, oldest message evicted"
			);
		}
		true
	}

	/// Removes and returns every entry of `class` matching `pattern`, oldest
	/// first.
	pub fn drain_matching(
		&mut self,
		class: TopicClass,
		pattern: &TopicPattern,
	) -> Vec<BufferedMessage> {
		self.purge_expired();
		let keys: Vec<MessageKey> = self
			.entries
			.iter()
			.rev()
			.filter(|(_, buffered)| {
				buffered.class == class && pattern.matches(&buffered.topic)
			})
			.map(|(key, _)| key.clone())
			.collect();
		keys.iter()
			.filter_map(|key| self.entries.pop(key))
			.collect()
	}

	/// Drops entries that outlived the TTL.
	pub fn purge_expired(&mut self) {
		let now = Instant::now();
		while let Some((_, oldest)) = self.entries.peek_lru() {
			if now.duration_since(oldest.arrived) < self.ttl {
				break;
			}
			if let Some((key, _)) = self.entries.pop_lru() {
				debug!(topic = %key.topic(), "Buffered message expired");
			}
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::envelope::Envelope;

	fn message(topic: &str, id: &str) -> (MessageKey, ParsedMessage, TopicPath) {
		let message = ParsedMessage {
			topic: topic.into(),
			payload: Envelope {
				id: id.into(),
				time: 1,
				data: Some(json!(id)),
			},
		};
		(message.key(), message, TopicPath::new(topic))
	}

	fn buffer(capacity: usize) -> EarlyArrivalBuffer {
		EarlyArrivalBuffer::new(
			NonZeroUsize::new(capacity).unwrap(),
			Duration::from_secs(60),
		)
	}

	fn push(buffer: &mut EarlyArrivalBuffer, topic: &str, id: &str) -> bool {
		let (key, message, path) = message(topic, id);
		buffer.insert(key, message, TopicClass::Event, path)
	}

	#[tokio::test(start_paused = true)]
	async fn test_drain_returns_matches_in_arrival_order() {
		let mut buffer = buffer(8);
		push(&mut buffer, "state/machine/01", "a");
		push(&mut buffer, "other/topic", "b");
		push(&mut buffer, "state/machine/02", "c");

		let pattern = TopicPattern::parse("state/:group/:id").unwrap();
		let drained = buffer.drain_matching(TopicClass::Event, &pattern);
		let ids: Vec<_> = drained
			.iter()
			.map(|b| b.message.payload.id.as_str())
			.collect();

		assert_eq!(ids, vec!["a", "c"]);
		assert_eq!(buffer.len(), 1);
		assert!(buffer.drain_matching(TopicClass::Event, &pattern).is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_class_must_agree() {
		let mut buffer = buffer(8);
		push(&mut buffer, "a/b", "1");
		let pattern = TopicPattern::parse("a/+").unwrap();
		assert!(buffer.drain_matching(TopicClass::Request, &pattern).is_empty());
		assert_eq!(buffer.len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_overflow_evicts_oldest() {
		let mut buffer = buffer(2);
		push(&mut buffer, "t/1", "1");
		push(&mut buffer, "t/2", "2");
		push(&mut buffer, "t/3", "3");

		let pattern = TopicPattern::parse("t/#").unwrap();
		let ids: Vec<_> = buffer
			.drain_matching(TopicClass::Event, &pattern)
			.into_iter()
			.map(|b| b.message.payload.id)
			.collect();
		assert_eq!(ids, vec!["2", "3"]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_duplicates_and_expiry() {
		let mut buffer = buffer(8);
		assert!(push(&mut buffer, "t/1", "1"));
		assert!(!push(&mut buffer, "t/1", "1"));

		tokio::time::advance(Duration::from_secs(61)).await;
		buffer.purge_expired();
		assert!(buffer.is_empty());
	}
}
