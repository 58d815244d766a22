//! # Invocation without a broker
//!
//! Two clients share an in-process [`MemoryBroker`]: a worker serving
//! `jobs/:queue/run` and a caller invoking it. Useful to try the routing
//! model without running mosquitto.

mod shared;

use std::sync::Arc;

use mqtt_rpc_router::prelude::*;
use mqtt_rpc_router::{ClientSettings, MemoryBroker};

#[tokio::main]
async fn main() -> Result<()> {
	shared::tracing::setup(Some("mqtt_rpc_router=debug"));

	let broker = MemoryBroker::new();

	let (worker_transport, worker_inbound) = broker.connect(64).await;
	let (worker, worker_connection) = RouterClient::with_transport(
		Arc::new(worker_transport),
		worker_inbound,
		ClientSettings::default(),
	)?;

	let mut jobs = Router::new();
	jobs.handle("jobs/:queue/run", |p: Publication| async move {
		let items: Vec<u32> = p.data_as()?;
		let queue = p.param("queue").unwrap_or_default().to_string();
		tracing::info!(queue = %queue, items = items.len(), "Running job");
		Ok::<_, HandlerError>(items.iter().sum::<u32>())
	});
	jobs.on("jobs/:queue/log", |p: Publication| async move {
		println!("[{}] {:?}", p.param("queue").unwrap_or_default(), p.data);
	});
	worker.mount("", &jobs).await?;

	let (caller_transport, caller_inbound) = broker.connect(64).await;
	let (caller, caller_connection) = RouterClient::with_transport(
		Arc::new(caller_transport),
		caller_inbound,
		ClientSettings::default(),
	)?;

	let agent = caller.agent("jobs");
	let total: u32 = agent.invoke_async("fast/run", &[1, 2, 3, 4]).await?;
	println!("fast queue total: {total}");

	let total: u32 = agent.invoke_async("slow/run", &[10, 20]).await?;
	println!("slow queue total: {total}");

	agent.publish("fast/log", &"all jobs done").await?;
	tokio::time::sleep(std::time::Duration::from_millis(50)).await;

	println!("worker stats: {:?}", worker.stats().await?);

	caller_connection.shutdown().await?;
	worker_connection.shutdown().await?;
	Ok(())
}
