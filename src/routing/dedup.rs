use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::envelope::MessageKey;

/// Default retention of processed message keys
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Time-windowed set of processed `(topic, envelope)` keys.
///
/// Entries live for `retention` after insertion; expired entries read as
/// absent and are purged lazily.
#[derive(Debug)]
pub struct DedupStore {
	retention: Duration,
	entries: HashMap<MessageKey, Instant>,
	expiry: VecDeque<(Instant, MessageKey)>,
}

impl DedupStore {
	pub fn new(retention: Duration) -> Self {
		Self {
			retention,
			entries: HashMap::new(),
			expiry: VecDeque::new(),
		}
	}

	/// Records `key` as processed, restarting its retention window.
	pub fn add(&mut self, key: MessageKey) {
		self.purge_expired();
		let deadline = Instant::now() + self.retention;
		self.entries.insert(key.clone(), deadline);
		self.expiry.push_back((deadline, key));
	}

	/// Returns true while `key` is inside its retention window.
	pub fn has(&self, key: &MessageKey) -> bool {
		self.entries
			.get(key)
			.is_some_and(|deadline| *deadline > Instant::now())
	}

	pub fn delete(&mut self, key: &MessageKey) -> bool {
		self.entries.remove(key).is_some()
	}

	/// Drops every entry whose window has elapsed.
	pub fn purge_expired(&mut self) {
		let now = Instant::now();
		while let Some((deadline, _)) = self.expiry.front() {
			if *deadline > now {
				break;
			}
			let Some((deadline, key)) = self.expiry.pop_front() else {
				break;
			};
			// A re-added key carries a later deadline in `entries`.
			if self.entries.get(&key) == Some(&deadline) {
				self.entries.remove(&key);
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

impl Default for DedupStore {
	fn default() -> Self {
		Self::new(DEFAULT_RETENTION)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::envelope::{Envelope, ParsedMessage};

	fn key(topic: &str, id: &str) -> MessageKey {
		ParsedMessage {
			topic: topic.into(),
			payload: Envelope {
				id: id.into(),
				time: 1,
				data: None,
			},
		}
		.key()
	}

	#[tokio::test(start_paused = true)]
	async fn test_entries_expire_after_retention() {
		let mut store = DedupStore::new(Duration::from_secs(10));
		store.add(key("a/b", "x1"));

		assert!(store.has(&key("a/b", "x1")));
		assert!(!store.has(&key("a/b", "x2")));
		assert!(!store.has(&key("a/c", "x1")));

		tokio::time::advance(Duration::from_secs(11)).await;
		assert!(!store.has(&key("a/b", "x1")));

		store.purge_expired();
		assert!(store.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_readd_extends_window() {
		let mut store = DedupStore::new(Duration::from_secs(10));
		store.add(key("a", "1"));
		tokio::time::advance(Duration::from_secs(6)).await;
		store.add(key("a", "1"));
		tokio::time::advance(Duration::from_secs(6)).await;

		store.purge_expired();
		assert!(store.has(&key("a", "1")));
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn test_delete_releases_key() {
		let mut store = DedupStore::default();
		store.add(key("a", "1"));
		assert!(store.delete(&key("a", "1")));
		assert!(!store.has(&key("a", "1")));
		assert!(!store.delete(&key("a", "1")));
	}
}
