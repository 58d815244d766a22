//! In-process broker with MQTT wildcard semantics.
//!
//! Every connection gets one delivery per matching publish no matter how
//! many of its filters overlap. Retained messages are not stored.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::debug;

use super::{InboundMessage, PublishOptions, Transport, TransportError};
use crate::topic::{SubscriptionTree, TopicPath, TopicPattern};

type SessionId = u64;

#[derive(Default)]
struct BrokerState {
	filters: SubscriptionTree<HashMap<SessionId, QoS>>,
	sessions: HashMap<SessionId, mpsc::Sender<InboundMessage>>,
}

/// Shared in-memory broker; clones refer to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
	state: Arc<RwLock<BrokerState>>,
	next_session: Arc<AtomicU64>,
}

impl MemoryBroker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens a connection whose deliveries arrive on the returned receiver.
	pub async fn connect(
		&self,
		capacity: usize,
	) -> (MemoryTransport, mpsc::Receiver<InboundMessage>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));
		let session = self.next_session.fetch_add(1, Ordering::Relaxed);
		self.state.write().await.sessions.insert(session, tx);
		debug!(session, "Memory transport connected");

		let transport = MemoryTransport {
			broker: self.clone(),
			session,
			filters: Mutex::new(HashSet::new()),
			closed: AtomicBool::new(false),
		};
		(transport, rx)
	}

	/// Delivers `payload` to every connection with a matching filter.
	///
	/// Returns the number of connections reached.
	pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> usize {
		let message = InboundMessage {
			topic: topic.into(),
			payload: payload.into(),
		};
		let receivers: Vec<mpsc::Sender<InboundMessage>> = {
			let state = self.state.read().await;
			let sessions: BTreeSet<SessionId> = state
				.filters
				.find(&TopicPath::new(message.topic.clone()))
				.into_iter()
				.flat_map(|slot| slot.keys().copied())
				.collect();
			sessions
				.iter()
				.filter_map(|id| state.sessions.get(id).cloned())
				.collect()
		};

		let mut delivered = 0;
		for receiver in receivers {
			if receiver.send(message.clone()).await.is_ok() {
				delivered += 1;
			}
		}
		delivered
	}

	async fn add_filter(&self, session: SessionId, filter: &TopicPattern, qos: QoS) {
		self.state
			.write()
			.await
			.filters
			.entry(filter)
			.insert(session, qos);
	}

	async fn remove_filter(&self, session: SessionId, filter: &TopicPattern) {
		self.state.write().await.filters.update(filter, |slot| {
			slot.remove(&session);
		});
	}

	async fn close_session(&self, session: SessionId, filters: &[TopicPattern]) {
		let mut state = self.state.write().await;
		for filter in filters {
			state.filters.update(filter, |slot| {
				slot.remove(&session);
			});
		}
		state.sessions.remove(&session);
	}
}

/// One connection to a [`MemoryBroker`].
pub struct MemoryTransport {
	broker: MemoryBroker,
	session: SessionId,
	filters: Mutex<HashSet<String>>,
	closed: AtomicBool,
}

impl MemoryTransport {
	/// Active filters of this connection, sorted.
	pub async fn subscriptions(&self) -> Vec<String> {
		let mut filters: Vec<String> =
			self.filters.lock().await.iter().cloned().collect();
		filters.sort();
		filters
	}

	fn ensure_open(&self) -> Result<(), TransportError> {
		if self.closed.load(Ordering::Acquire) {
			Err(TransportError::Closed)
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl Transport for MemoryTransport {
	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		_options: PublishOptions,
	) -> Result<(), TransportError> {
		self.ensure_open()?;
		self.broker.publish(topic, payload).await;
		Ok(())
	}

	async fn subscribe(
		&self,
		filter: &str,
		qos: QoS,
	) -> Result<(), TransportError> {
		self.ensure_open()?;
		let pattern = TopicPattern::parse(filter)?;
		self.broker.add_filter(self.session, &pattern, qos).await;
		self.filters.lock().await.insert(filter.to_string());
		Ok(())
	}

	async fn unsubscribe(&self, filter: &str) -> Result<(), TransportError> {
		self.ensure_open()?;
		let pattern = TopicPattern::parse(filter)?;
		self.broker.remove_filter(self.session, &pattern).await;
		self.filters.lock().await.remove(filter);
		Ok(())
	}

	async fn disconnect(&self) -> Result<(), TransportError> {
		if self.closed.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		let filters: Vec<TopicPattern> = self
			.filters
			.lock()
			.await
			.drain()
			.filter_map(|f| TopicPattern::parse(f).ok())
			.collect();
		self.broker.close_session(self.session, &filters).await;
		debug!(session = self.session, "Memory transport disconnected");
		Ok(())
	}
}
