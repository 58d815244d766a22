//! Shared harness for integration tests against the in-memory broker.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mqtt_rpc_router::{
	ClientSettings, Envelope, InboundMessage, MemoryBroker, MemoryTransport,
	Publication, QoS, RouteOptions, Router, RouterClient, RouterConnection,
	TransportPtr,
};
use serde_json::Value;
use tokio::sync::mpsc;

pub struct Harness {
	pub broker: MemoryBroker,
	pub transport: Arc<MemoryTransport>,
	pub client: RouterClient,
	pub connection: RouterConnection,
	/// Delivers straight to the dispatcher, bypassing broker subscriptions
	pub inject: mpsc::Sender<InboundMessage>,
}

impl Harness {
	pub async fn start() -> Self {
		Self::start_with(ClientSettings::default()).await
	}

	pub async fn start_with(settings: ClientSettings) -> Self {
		Self::start_wrapped(settings, |transport| transport as TransportPtr).await
	}

	/// Lets the client talk through `wrap(transport)` instead of the raw
	/// memory transport.
	pub async fn start_wrapped(
		settings: ClientSettings,
		wrap: impl FnOnce(Arc<MemoryTransport>) -> TransportPtr,
	) -> Self {
		init_tracing();
		let broker = MemoryBroker::new();
		let (transport, mut delivered) = broker.connect(64).await;
		let transport = Arc::new(transport);

		let (inject, inbound) = mpsc::channel(64);
		let forward = inject.clone();
		tokio::spawn(async move {
			while let Some(message) = delivered.recv().await {
				if forward.send(message).await.is_err() {
					break;
				}
			}
		});

		let (client, connection) =
			RouterClient::with_transport(wrap(transport.clone()), inbound, settings)
				.expect("client should start");
		Self {
			broker,
			transport,
			client,
			connection,
			inject,
		}
	}

	pub async fn inject_raw(&self, topic: &str, payload: impl Into<Bytes>) {
		self.inject
			.send(InboundMessage {
				topic: topic.into(),
				payload: payload.into(),
			})
			.await
			.expect("dispatcher should accept deliveries");
	}

	pub async fn inject(&self, topic: &str, envelope: &Envelope) {
		self.inject_raw(topic, envelope.encode().unwrap()).await;
	}

	/// Second connection on the same broker watching `filter`.
	pub async fn observe(&self, filter: &str) -> Observer {
		let (transport, rx) = self.broker.connect(64).await;
		mqtt_rpc_router::Transport::subscribe(&transport, filter, QoS::AtLeastOnce)
			.await
			.unwrap();
		Observer {
			_transport: transport,
			rx,
		}
	}

	pub async fn shutdown(self) {
		self.connection.shutdown().await.unwrap();
	}
}

pub struct Observer {
	_transport: MemoryTransport,
	rx: mpsc::Receiver<InboundMessage>,
}

impl Observer {
	/// Every delivery received so far, decoded.
	pub fn drain(&mut self) -> Vec<(String, Envelope)> {
		let mut received = Vec::new();
		while let Ok(message) = self.rx.try_recv() {
			let envelope = Envelope::decode(&message.payload).unwrap();
			received.push((message.topic.to_string(), envelope));
		}
		received
	}
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Lets spawned tasks run without advancing paused time meaningfully.
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn envelope(id: &str, data: Value) -> Envelope {
	Envelope {
		id: id.into(),
		time: 1_700_000_000_000,
		data: Some(data),
	}
}

pub fn record(router: &mut Router, pattern: &str) -> mpsc::Receiver<Publication> {
	record_with(router, pattern, RouteOptions::default())
}

pub fn record_with(
	router: &mut Router,
	pattern: &str,
	options: RouteOptions,
) -> mpsc::Receiver<Publication> {
	let (tx, rx) = mpsc::channel(64);
	router.on_with(
		pattern,
		move |publication| {
			let tx = tx.clone();
			async move {
				let _ = tx.send(publication).await;
			}
		},
		options,
	);
	rx
}

pub fn drain(rx: &mut mpsc::Receiver<Publication>) -> Vec<Publication> {
	let mut received = Vec::new();
	while let Ok(publication) = rx.try_recv() {
		received.push(publication);
	}
	received
}
