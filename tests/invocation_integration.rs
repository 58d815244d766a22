//! Request/response correlation against the in-memory broker.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::{Harness, envelope, settle};
use mqtt_rpc_router::{
	ClientError, ClientSettings, HandlerError, InvokeOptions, MemoryTransport,
	Publication, PublishOptions, QoS, Router, Transport, TransportError,
	TransportPtr,
};
use serde_json::json;

/// Memory transport whose unsubscribe never completes.
struct StuckUnsubscribe {
	inner: Arc<MemoryTransport>,
}

#[async_trait]
impl Transport for StuckUnsubscribe {
	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		options: PublishOptions,
	) -> Result<(), TransportError> {
		self.inner.publish(topic, payload, options).await
	}

	async fn subscribe(
		&self,
		filter: &str,
		qos: QoS,
	) -> Result<(), TransportError> {
		self.inner.subscribe(filter, qos).await
	}

	async fn unsubscribe(&self, _filter: &str) -> Result<(), TransportError> {
		std::future::pending().await
	}

	async fn disconnect(&self) -> Result<(), TransportError> {
		self.inner.disconnect().await
	}
}

fn adder() -> Router {
	let mut router = Router::new();
	router.handle("cmd/reboot", |p: Publication| async move {
		let value: i64 = p.data_as()?;
		Ok::<_, HandlerError>(value + 200)
	});
	router
}

#[tokio::test(start_paused = true)]
async fn test_invoke_async_resolves_handler_result() {
	let harness = Harness::start().await;
	harness.client.mount("", &adder()).await.unwrap();
	assert_eq!(
		harness.transport.subscriptions().await,
		vec!["__req/cmd/reboot"]
	);

	let agent = harness.client.root_agent();
	let reply: i64 = agent.invoke_async("cmd/reboot", &100).await.unwrap();
	assert_eq!(reply, 300);

	settle().await;
	assert_eq!(harness.client.stats().await.unwrap().responders, 0);
	assert_eq!(
		harness.transport.subscriptions().await,
		vec!["__req/cmd/reboot"]
	);

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_invoke_async_times_out_without_handler() {
	let harness = Harness::start().await;
	let agent = harness.client.root_agent();

	let started = tokio::time::Instant::now();
	let result = agent.invoke_async::<i64, _>("cmd/reboot", &100).await;
	match result {
		| Err(ClientError::InvocationTimeout {
			topic,
			timeout_millis,
		}) => {
			assert_eq!(topic, "cmd/reboot");
			assert_eq!(timeout_millis, 5000);
		}
		| other => panic!("expected timeout, got {other:?}"),
	}
	assert!(started.elapsed() >= Duration::from_millis(5000));

	settle().await;
	assert_eq!(harness.client.stats().await.unwrap().responders, 0);
	assert!(harness.transport.subscriptions().await.is_empty());

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_per_call_timeout_override() {
	let harness = Harness::start().await;
	let agent = harness.client.root_agent();

	let result = agent
		.invoke_async_with::<i64, _>(
			"cmd/reboot",
			&1,
			InvokeOptions::new().timeout(Duration::from_millis(250)),
		)
		.await;
	assert!(matches!(
		result,
		Err(ClientError::InvocationTimeout {
			timeout_millis: 250,
			..
		})
	));

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_handler_params_and_nested_agent() {
	let harness = Harness::start().await;
	let mut router = Router::new();
	router.handle("action/:group/:id/:command", |p: Publication| async move {
		Ok::<_, HandlerError>(json!({
			"group": p.param("group"),
			"id": p.param("id"),
			"command": p.param("command"),
			"topic": p.topic.as_str(),
		}))
	});
	harness.client.mount("server/main", &router).await.unwrap();

	let agent = harness.client.agent("server").child("main");
	assert_eq!(agent.full_topic("x"), "server/main/x");

	let reply: serde_json::Value = agent
		.invoke_async("action/machine/01/start", &())
		.await
		.unwrap();
	assert_eq!(
		reply,
		json!({
			"group": "machine",
			"id": "01",
			"command": "start",
			"topic": "__req/server/main/action/machine/01/start",
		})
	);

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_invocations_are_independent() {
	let harness = Harness::start().await;
	harness.client.mount("", &adder()).await.unwrap();
	let agent = harness.client.root_agent();

	let (first, second) = tokio::join!(
		agent.invoke_async::<i64, _>("cmd/reboot", &1),
		agent.invoke_async::<i64, _>("cmd/reboot", &2),
	);
	assert_eq!(first.unwrap(), 201);
	assert_eq!(second.unwrap(), 202);

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unit_reply_omits_data() {
	let harness = Harness::start().await;
	let mut router = Router::new();
	router.handle("wifi/scan/start", |_| async { Ok::<_, HandlerError>(()) });
	harness.client.mount("", &router).await.unwrap();

	let reply: Option<i64> = harness
		.client
		.root_agent()
		.invoke_async("wifi/scan/start", &())
		.await
		.unwrap();
	assert_eq!(reply, None);

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_early_request_answered_when_handler_mounts() {
	let harness = Harness::start().await;
	let mut replies = harness.observe("__res/#").await;

	harness
		.inject("__req/cmd/reboot", &envelope("abc12", json!(1)))
		.await;
	settle().await;
	assert_eq!(harness.client.stats().await.unwrap().buffered, 1);

	harness.client.mount("", &adder()).await.unwrap();
	settle().await;

	let received = replies.drain();
	assert_eq!(received.len(), 1);
	assert_eq!(received[0].0, "__res/cmd/reboot/abc12");
	assert_eq!(received[0].1.data, Some(json!(201)));
	assert_ne!(received[0].1.id, "abc12");

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_request_runs_handler_once() {
	let harness = Harness::start().await;
	let calls = Arc::new(AtomicUsize::new(0));
	let mut router = Router::new();
	let counter = calls.clone();
	router.handle("cmd/reboot", move |_| {
		let counter = counter.clone();
		async move {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok::<_, HandlerError>("ok")
		}
	});
	harness.client.mount("", &router).await.unwrap();
	let mut replies = harness.observe("__res/#").await;

	let request = envelope("dup01", json!(null));
	harness.inject("__req/cmd/reboot", &request).await;
	harness.inject("__req/cmd/reboot", &request).await;
	settle().await;
	// Redelivery after the handler finished
	harness.inject("__req/cmd/reboot", &request).await;
	settle().await;

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(replies.drain().len(), 1);

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_handler_sends_no_reply_and_allows_retry() {
	let harness = Harness::start().await;
	let calls = Arc::new(AtomicUsize::new(0));
	let mut router = Router::new();
	let counter = calls.clone();
	router.handle("cmd/reboot", move |_| {
		let counter = counter.clone();
		async move {
			if counter.fetch_add(1, Ordering::SeqCst) == 0 {
				return Err(HandlerError::from("device busy"));
			}
			Ok("rebooting")
		}
	});
	harness.client.mount("", &router).await.unwrap();
	let mut replies = harness.observe("__res/#").await;

	let request = envelope("retry", json!(null));
	harness.inject("__req/cmd/reboot", &request).await;
	settle().await;
	assert!(replies.drain().is_empty());

	harness.inject("__req/cmd/reboot", &request).await;
	settle().await;

	let received = replies.drain();
	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert_eq!(received.len(), 1);
	assert_eq!(received[0].1.data, Some(json!("rebooting")));

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_invocation_releases_responder() {
	let harness = Harness::start().await;
	let agent = harness.client.root_agent();

	let abandoned = tokio::time::timeout(
		Duration::from_millis(10),
		agent.invoke_async::<i64, _>("nobody/home", &1),
	)
	.await;
	assert!(abandoned.is_err());

	settle().await;
	assert_eq!(harness.client.stats().await.unwrap().responders, 0);
	assert!(harness.transport.subscriptions().await.is_empty());

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_response_is_dropped() {
	let harness = Harness::start().await;
	harness
		.inject("__res/cmd/reboot/zzzzz", &envelope("late1", json!(5)))
		.await;
	settle().await;

	let stats = harness.client.stats().await.unwrap();
	assert_eq!(stats.buffered, 0);
	assert_eq!(stats.responders, 0);

	harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_unsubscribe_does_not_stall_dispatcher() {
	let harness = Harness::start_wrapped(ClientSettings::default(), |inner| {
		let transport: TransportPtr = Arc::new(StuckUnsubscribe { inner });
		transport
	})
	.await;
	harness.client.mount("", &adder()).await.unwrap();
	let agent = harness.client.root_agent();

	let reply = tokio::time::timeout(
		Duration::from_secs(1),
		agent.invoke_async::<i64, _>("cmd/reboot", &1),
	)
	.await
	.expect("invocation should not wait on unsubscribe");
	assert_eq!(reply.unwrap(), 201);

	let stats = tokio::time::timeout(Duration::from_secs(1), harness.client.stats())
		.await
		.expect("dispatcher should keep serving commands")
		.unwrap();
	assert_eq!(stats.responders, 0);
	assert_eq!(stats.handlers, 1);

	let second: i64 = agent.invoke_async("cmd/reboot", &2).await.unwrap();
	assert_eq!(second, 202);
	// No shutdown: its cleanup unsubscribes through the stuck transport.
}
