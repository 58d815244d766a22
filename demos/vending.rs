//! # Vending machine over a real broker
//!
//! One process plays both sides:
//! - the machine mounts `action/:group/:id/:command` handlers and a
//!   debounced `state/:group/:id` listener under `server/main`
//! - a client agent invokes commands and publishes state changes
//!
//! Requests travel on `__req/server/main/action/...`, replies come back on
//! `__res/server/main/action/.../<id>`.

mod shared;

use std::time::Duration;

use mqtt_rpc_router::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
struct Dispense {
	slot: u8,
	quantity: u32,
}

#[derive(Serialize, Deserialize, Debug)]
struct Receipt {
	machine: String,
	slot: u8,
	dispensed: u32,
}

fn machine_router() -> Router {
	let mut actions = Router::new();
	actions.handle("action/:group/:id/dispense", |p: Publication| async move {
		let request: Dispense = p.data_as()?;
		let machine = format!(
			"{}-{}",
			p.param("group").unwrap_or_default(),
			p.param("id").unwrap_or_default()
		);
		Ok::<_, HandlerError>(Receipt {
			machine,
			slot: request.slot,
			dispensed: request.quantity.min(3),
		})
	});
	actions.handle("action/:group/:id/:command", |p: Publication| async move {
		let command = p.param("command").unwrap_or_default().to_string();
		if command == "explode" {
			return Err(HandlerError::from("refusing to explode"));
		}
		Ok(format!("{command} acknowledged"))
	});

	let mut state = Router::with_options(
		RouteOptions::new().debounce(Duration::from_millis(250)),
	);
	state.on("state/:group/:id", |p: Publication| async move {
		println!(
			"State of {}/{} settled: {:?}",
			p.param("group").unwrap_or_default(),
			p.param("id").unwrap_or_default(),
			p.data
		);
	});

	let mut root = Router::new();
	root.mount("", &actions).mount("", &state);
	root
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
	shared::tracing::setup(None);

	let connection_url = shared::config::build_url("vending");
	println!("Connecting to MQTT broker: {connection_url}");

	let (client, connection) = RouterClient::connect(&connection_url)
		.await
		.inspect_err(|e| {
			shared::config::print_connection_error(&connection_url, e);
		})?;

	client.mount("server/main", &machine_router()).await?;
	println!("Machine mounted: {:?}", client.stats().await?);

	let agent = client.agent("server").child("main");

	let receipt: Receipt = agent
		.invoke_async(
			"action/machine/01/dispense",
			&Dispense {
				slot: 4,
				quantity: 5,
			},
		)
		.await?;
	println!("Receipt: {receipt:?}");

	let ack: String = agent.invoke_async("action/machine/01/start", &()).await?;
	println!("Reply: {ack}");

	match agent
		.invoke_async_with::<String, _>(
			"action/machine/01/explode",
			&(),
			InvokeOptions::new().timeout(Duration::from_secs(1)),
		)
		.await
	{
		| Err(ClientError::InvocationTimeout { topic, .. }) => {
			println!("No reply for {topic}, the handler failed");
		}
		| other => println!("Unexpected outcome: {other:?}"),
	}

	// Burst of state updates, only the last one reaches the listener
	for door in ["opening", "open", "closing", "closed"] {
		agent
			.publish("state/machine/01", &serde_json::json!({ "door": door }))
			.await?;
		tokio::time::sleep(Duration::from_millis(50)).await;
	}
	tokio::time::sleep(Duration::from_millis(500)).await;

	connection.shutdown().await?;
	println!("Disconnected");
	Ok(())
}
