use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use arcstr::ArcStr;
use tokio::sync::mpsc::{self, Receiver, Sender, WeakSender, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use super::buffer::EarlyArrivalBuffer;
use super::debounce::Debouncer;
use super::dedup::DedupStore;
use super::error::DispatchError;
use super::lane::ListenerLane;
use super::router::{HandlerFn, ListenerFn, MountedRoute, Publication};
use crate::envelope::{Envelope, MessageKey, ParsedMessage};
use crate::topic::protocol::{self, TopicClass};
use crate::topic::{TopicParams, TopicPath};
use crate::transport::{InboundMessage, PublishOptions, TransportPtr};

/// Settings the dispatcher is spawned with.
#[derive(Debug, Clone)]
pub(crate) struct DispatcherSettings {
	pub command_channel_capacity: usize,
	pub dedup_retention: Duration,
	pub buffer_capacity: NonZeroUsize,
	pub buffer_ttl: Duration,
	pub id_length: usize,
}

/// Snapshot of the dispatcher registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
	pub listeners: usize,
	pub handlers: usize,
	pub responders: usize,
	pub deduped: usize,
	pub buffered: usize,
	pub pending_debounce: usize,
}

pub(crate) enum Command {
	MountListener(MountedRoute<ListenerFn>, oneshot::Sender<usize>),
	MountHandler(MountedRoute<HandlerFn>, oneshot::Sender<usize>),
	RegisterResponder {
		topic: ArcStr,
		resolver: oneshot::Sender<Envelope>,
		ack: oneshot::Sender<()>,
	},
	ReleaseResponder {
		topic: ArcStr,
		ack: Option<oneshot::Sender<()>>,
	},
	/// Handler failed, the request may be retried on redelivery
	RequestFailed(MessageKey),
	DebounceElapsed {
		topic: ArcStr,
		generation: u64,
	},
	Stats(oneshot::Sender<DispatchStats>),
}

/// Routes of one kind in registration order.
struct RouteTable<C> {
	routes: Vec<MountedRoute<C>>,
}

impl<C: Clone> RouteTable<C> {
	fn new() -> Self {
		Self { routes: Vec::new() }
	}

	/// Appends `route`, or replaces the route with the same pattern in place.
	///
	/// Returns true on replacement.
	fn insert(&mut self, route: MountedRoute<C>) -> bool {
		match self
			.routes
			.iter_mut()
			.find(|r| r.pattern.template() == route.pattern.template())
		{
			| Some(existing) => {
				*existing = route;
				true
			}
			| None => {
				self.routes.push(route);
				false
			}
		}
	}

	/// First route in registration order whose pattern matches `topic`.
	fn first_match(
		&self,
		topic: &TopicPath,
	) -> Option<(&MountedRoute<C>, TopicParams)> {
		self.routes.iter().find_map(|route| {
			route.pattern.try_match(topic).map(|params| (route, params))
		})
	}

	fn subscriptions(&self) -> impl Iterator<Item = &ArcStr> {
		self.routes.iter().map(MountedRoute::subscription)
	}

	fn len(&self) -> usize {
		self.routes.len()
	}
}

pub(crate) struct DispatcherActor {
	listeners: RouteTable<ListenerFn>,
	// One per listener pattern, kept across in-place replacement
	lanes: HashMap<ArcStr, ListenerLane>,
	handlers: RouteTable<HandlerFn>,
	responders: HashMap<ArcStr, oneshot::Sender<Envelope>>,
	deduped: DedupStore,
	buffered: EarlyArrivalBuffer,
	debouncer: Debouncer,
	transport: TransportPtr,
	id_length: usize,
	command_rx: Receiver<Command>,
	// Weak, so the channel closes once every handle is gone
	command_tx: WeakSender<Command>,
	inbound_rx: Receiver<InboundMessage>,
	shutdown_rx: oneshot::Receiver<()>,
}

impl DispatcherActor {
	pub fn spawn(
		transport: TransportPtr,
		inbound_rx: Receiver<InboundMessage>,
		settings: DispatcherSettings,
	) -> (DispatcherController, DispatcherHandle) {
		let (command_tx, command_rx) =
			mpsc::channel(settings.command_channel_capacity);
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let actor = Self {
			listeners: RouteTable::new(),
			lanes: HashMap::new(),
			handlers: RouteTable::new(),
			responders: HashMap::new(),
			deduped: DedupStore::new(settings.dedup_retention),
			buffered: EarlyArrivalBuffer::new(
				settings.buffer_capacity,
				settings.buffer_ttl,
			),
			debouncer: Debouncer::new(),
			transport,
			id_length: settings.id_length,
			command_rx,
			command_tx: command_tx.downgrade(),
			inbound_rx,
			shutdown_rx,
		};
		let join_handle = tokio::spawn(async move { actor.run().await });

		let controller = DispatcherController {
			shutdown_tx,
			join_handle,
		};
		let handle = DispatcherHandle { command_tx };
		(controller, handle)
	}

	async fn run(mut self) {
		let mut commands_open = true;
		let mut inbound_open = true;
		while commands_open || inbound_open {
			tokio::select! {
				_ = &mut self.shutdown_rx => {
					info!("Dispatcher: Shutdown signal received");
					break;
				}
				cmd = self.command_rx.recv(), if commands_open => match cmd {
					| Some(cmd) => self.handle_command(cmd).await,
					| None => {
						info!("Dispatcher: Command channel closed");
						commands_open = false;
					}
				},
				message = self.inbound_rx.recv(), if inbound_open => match message {
					| Some(message) => self.handle_inbound(message),
					| None => {
						info!("Dispatcher: Inbound channel closed");
						inbound_open = false;
					}
				},
			}
		}
		info!("Dispatcher: Exiting run loop");
		self.cleanup().await
	}

	/// Unsubscribes every mounted route and drops pending state.
	async fn cleanup(&mut self) {
		self.debouncer.cancel_all();
		self.lanes.clear();

		let subscriptions: Vec<ArcStr> = self
			.handlers
			.subscriptions()
			.chain(self.listeners.subscriptions())
			.cloned()
			.collect();
		for filter in subscriptions {
			if let Err(err) = self.transport.unsubscribe(&filter).await {
				error!(
					topic_pattern = %filter,
					error = %err,
					"Failed to unsubscribe from topic pattern"
				);
			}
		}

		if !self.responders.is_empty() {
			warn!(
				pending = self.responders.len(),
				"Dispatcher stopped with pending invocations"
			);
		}
		self.responders.clear();
	}

	async fn handle_command(&mut self, cmd: Command) {
		match cmd {
			| Command::MountListener(route, reply) => {
				let drained = self.mount_listener(route);
				let _ = reply.send(drained);
			}
			| Command::MountHandler(route, reply) => {
				let drained = self.mount_handler(route);
				let _ = reply.send(drained);
			}
			| Command::RegisterResponder {
				topic,
				resolver,
				ack,
			} => {
				debug!(topic = %topic, "Responder registered");
				self.responders.insert(topic, resolver);
				let _ = ack.send(());
			}
			| Command::ReleaseResponder { topic, ack } => {
				self.responders.remove(&topic);
				if let Some(ack) = ack {
					let _ = ack.send(());
				}
				// Off the loop: the transport may be waiting on our inbound queue.
				let transport = self.transport.clone();
				tokio::spawn(async move {
					if let Err(err) = transport.unsubscribe(&topic).await {
						warn!(
							topic = %topic,
							error = %err,
							"Failed to unsubscribe from response topic"
						);
					}
				});
			}
			| Command::RequestFailed(key) => {
				self.deduped.delete(&key);
			}
			| Command::DebounceElapsed { topic, generation } => {
				self.debouncer.complete(&topic, generation);
			}
			| Command::Stats(reply) => {
				let _ = reply.send(self.stats());
			}
		}
	}

	fn stats(&self) -> DispatchStats {
		DispatchStats {
			listeners: self.listeners.len(),
			handlers: self.handlers.len(),
			responders: self.responders.len(),
			deduped: self.deduped.len(),
			buffered: self.buffered.len(),
			pending_debounce: self.debouncer.pending(),
		}
	}

	fn mount_listener(&mut self, route: MountedRoute<ListenerFn>) -> usize {
		let pattern = route.pattern.clone();
		let callback = route.callback.clone();
		let debounce = route.options.debounce;
		if self.listeners.insert(route) {
			debug!(topic_pattern = %pattern, "Listener replaced");
		}
		let lane = self
			.lanes
			.entry(pattern.template().clone())
			.or_insert_with(|| ListenerLane::spawn(pattern.template().clone()))
			.clone();

		let drained = self.buffered.drain_matching(TopicClass::Event, &pattern);
		let count = drained.len();
		for buffered in drained {
			let key = buffered.message.key();
			if self.deduped.has(&key) {
				continue;
			}
			let params = pattern.try_match(&buffered.topic).unwrap_or_default();
			self.deliver_event(&lane, &callback, debounce, params, buffered.message);
			self.deduped.add(key);
		}
		if count > 0 {
			debug!(topic_pattern = %pattern, count, "Replayed buffered events");
		}
		count
	}

	fn mount_handler(&mut self, route: MountedRoute<HandlerFn>) -> usize {
		let pattern = route.pattern.clone();
		let callback = route.callback.clone();
		let options = publish_options(&route);
		if self.handlers.insert(route) {
			debug!(topic_pattern = %pattern, "Handler replaced");
		}

		let drained = self.buffered.drain_matching(TopicClass::Request, &pattern);
		let count = drained.len();
		for buffered in drained {
			let key = buffered.message.key();
			if self.deduped.has(&key) {
				continue;
			}
			let params = pattern.try_match(&buffered.topic).unwrap_or_default();
			self.deduped.add(key.clone());
			self.spawn_handler(callback.clone(), options, params, buffered.message, key);
		}
		if count > 0 {
			debug!(topic_pattern = %pattern, count, "Replayed buffered requests");
		}
		count
	}

	fn handle_inbound(&mut self, inbound: InboundMessage) {
		let payload = match Envelope::decode(&inbound.payload) {
			| Ok(payload) => payload,
			| Err(err) => {
				warn!(
					topic = %inbound.topic,
					payload_size = inbound.payload.len(),
					error = %err,
					"Dropping malformed message"
				);
				return;
			}
		};
		let message = ParsedMessage {
			topic: inbound.topic,
			payload,
		};
		let key = message.key();
		let class = protocol::classify(&message.topic);
		debug!(
			topic = %message.topic,
			id = %message.payload.id,
			class = ?class,
			"Dispatching message"
		);

		match class {
			| TopicClass::Response => self.dispatch_response(message, key),
			| TopicClass::Request => self.dispatch_request(message, key),
			| TopicClass::Event => self.dispatch_event(message, key),
		}
	}

	fn dispatch_response(&mut self, message: ParsedMessage, key: MessageKey) {
		if !self.responders.contains_key(&message.topic) {
			debug!(topic = %message.topic, "Response without responder dropped");
			return;
		}
		if self.deduped.has(&key) {
			debug!(topic = %message.topic, "Duplicate response suppressed");
			return;
		}
		if let Some(resolver) = self.responders.remove(&message.topic) {
			if resolver.send(message.payload).is_err() {
				debug!(topic = %message.topic, "Invocation no longer waiting");
			}
		}
		self.deduped.add(key);
	}

	fn dispatch_request(&mut self, message: ParsedMessage, key: MessageKey) {
		let topic = TopicPath::new(message.topic.clone());
		let Some((route, params)) = self.handlers.first_match(&topic) else {
			self.buffer(key, message, TopicClass::Request, topic);
			return;
		};
		if self.deduped.has(&key) {
			debug!(topic = %message.topic, "Duplicate request suppressed");
			return;
		}
		let callback = route.callback.clone();
		let options = publish_options(route);
		self.deduped.add(key.clone());
		self.spawn_handler(callback, options, params, message, key);
	}

	fn dispatch_event(&mut self, message: ParsedMessage, key: MessageKey) {
		let topic = TopicPath::new(message.topic.clone());
		let Some((route, params)) = self.listeners.first_match(&topic) else {
			self.buffer(key, message, TopicClass::Event, topic);
			return;
		};
		if self.deduped.has(&key) {
			debug!(topic = %message.topic, "Duplicate event suppressed");
			return;
		}
		let callback = route.callback.clone();
		let debounce = route.options.debounce;
		let Some(lane) = self.lanes.get(route.pattern.template()).cloned() else {
			error!(topic_pattern = %route.pattern, "Listener without lane");
			return;
		};
		self.deliver_event(&lane, &callback, debounce, params, message);
		self.deduped.add(key);
	}

	fn buffer(
		&mut self,
		key: MessageKey,
		message: ParsedMessage,
		class: TopicClass,
		topic: TopicPath,
	) {
		if self.deduped.has(&key) {
			debug!(topic = %message.topic, "Duplicate unmatched message suppressed");
			return;
		}
		debug!(topic = %message.topic, "No route matched, buffering message");
		self.buffered.insert(key, message, class, topic);
	}

	/// Queues the listener call on its lane, now or once the topic is quiet.
	fn deliver_event(
		&mut self,
		lane: &ListenerLane,
		callback: &ListenerFn,
		debounce: Option<Duration>,
		params: TopicParams,
		message: ParsedMessage,
	) {
		let publication = Publication {
			topic: message.topic.clone(),
			params,
			data: message.payload.data,
		};
		match debounce {
			| Some(period) => {
				let notify = self.command_tx.clone();
				let topic = message.topic.clone();
				let lane = lane.clone();
				let callback = callback.clone();
				self.debouncer.schedule(
					message.topic,
					period,
					move || lane.push(callback(publication)),
					move |generation| async move {
						if let Some(tx) = notify.upgrade() {
							let _ = tx
								.send(Command::DebounceElapsed { topic, generation })
								.await;
						}
					},
				);
			}
			| None => lane.push(callback(publication)),
		}
	}

	/// Runs the handler off the dispatch loop and publishes its reply.
	fn spawn_handler(
		&self,
		callback: HandlerFn,
		options: PublishOptions,
		params: TopicParams,
		message: ParsedMessage,
		key: MessageKey,
	) {
		let Some(reply_topic) =
			protocol::reply_topic(&message.topic, &message.payload.id)
		else {
			warn!(topic = %message.topic, "Request topic without prefix");
			return;
		};
		let publication = Publication {
			topic: message.topic.clone(),
			params,
			data: message.payload.data,
		};
		let transport = self.transport.clone();
		let notify = self.command_tx.clone();
		let id_length = self.id_length;
		let topic = message.topic;

		tokio::spawn(async move {
			let data = match callback(publication).await {
				| Ok(data) => data,
				| Err(err) => {
					warn!(topic = %topic, error = %err, "Handler failed, no reply sent");
					if let Some(tx) = notify.upgrade() {
						let _ = tx.send(Command::RequestFailed(key)).await;
					}
					return;
				}
			};
			let reply = Envelope::mark_with_id_length(data, id_length);
			let payload = match reply.encode() {
				| Ok(payload) => payload,
				| Err(err) => {
					error!(topic = %reply_topic, error = %err, "Failed to encode reply");
					return;
				}
			};
			match transport.publish(&reply_topic, payload, options).await {
				| Ok(()) => debug!(topic = %reply_topic, "Reply published"),
				| Err(err) => {
					error!(topic = %reply_topic, error = %err, "Failed to publish reply")
				}
			}
		});
	}
}

fn publish_options<C>(route: &MountedRoute<C>) -> PublishOptions {
	PublishOptions {
		qos: route.options.effective_qos(),
		retain: route.options.effective_retain(),
	}
}

pub(crate) struct DispatcherController {
	shutdown_tx: oneshot::Sender<()>,
	join_handle: JoinHandle<()>,
}

impl DispatcherController {
	pub async fn shutdown(self) -> Result<(), JoinError> {
		let _ = self.shutdown_tx.send(()).inspect_err(|_| {
			warn!("DispatcherController: Dispatcher already stopped");
		});
		self.join_handle.await.inspect_err(|e| {
			warn!(error = ?e, "DispatcherController: Dispatcher run failed");
		})
	}
}

/// Cloneable command side of the dispatcher.
#[derive(Clone, Debug)]
pub(crate) struct DispatcherHandle {
	command_tx: Sender<Command>,
}

impl DispatcherHandle {
	async fn request<R>(
		&self,
		make: impl FnOnce(oneshot::Sender<R>) -> Command,
	) -> Result<R, DispatchError> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(make(tx))
			.await
			.map_err(|_| DispatchError::ChannelClosed)?;
		rx.await.map_err(|_| DispatchError::ResponseLost)
	}

	/// Registers a listener; returns the number of replayed buffered events.
	pub async fn mount_listener(
		&self,
		route: MountedRoute<ListenerFn>,
	) -> Result<usize, DispatchError> {
		self.request(|tx| Command::MountListener(route, tx)).await
	}

	/// Registers a handler; returns the number of replayed buffered requests.
	pub async fn mount_handler(
		&self,
		route: MountedRoute<HandlerFn>,
	) -> Result<usize, DispatchError> {
		self.request(|tx| Command::MountHandler(route, tx)).await
	}

	/// Registers a one-shot resolver for a correlation topic.
	pub async fn register_responder(
		&self,
		topic: ArcStr,
	) -> Result<oneshot::Receiver<Envelope>, DispatchError> {
		let (resolver, response) = oneshot::channel();
		self.request(|ack| Command::RegisterResponder {
			topic,
			resolver,
			ack,
		})
		.await?;
		Ok(response)
	}

	/// Drops the responder of `topic` and unsubscribes from it.
	pub async fn release_responder(
		&self,
		topic: ArcStr,
	) -> Result<(), DispatchError> {
		self.request(|ack| Command::ReleaseResponder {
			topic,
			ack: Some(ack),
		})
		.await
	}

	/// Non-blocking [`DispatcherHandle::release_responder`] for drop paths.
	pub fn try_release_responder(&self, topic: ArcStr) -> bool {
		match self
			.command_tx
			.try_send(Command::ReleaseResponder { topic, ack: None })
		{
			| Ok(()) => true,
			| Err(TrySendError::Closed(_)) => {
				// Dispatcher gone, nothing left to release.
				true
			}
			| Err(TrySendError::Full(_)) => false,
		}
	}

	pub async fn stats(&self) -> Result<DispatchStats, DispatchError> {
		self.request(Command::Stats).await
	}
}
