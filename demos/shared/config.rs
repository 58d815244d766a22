use std::env;

use uuid::Uuid;

/// Get MQTT broker URL from environment variable or use default
///
/// Loads configuration from .env files in this order:
/// 1. demos/.env.local (if exists, ignored by git)
/// 2. demos/.env
/// 3. Environment variables
/// 4. Hardcoded default
pub fn broker_url() -> String {
	dotenv::dotenv().ok();
	dotenv::from_filename("demos/.env").ok();
	if std::path::Path::new("demos/.env.local").exists() {
		dotenv::from_filename("demos/.env.local").ok();
	}

	env::var("MQTT_BROKER")
		.unwrap_or_else(|_| "mqtt://localhost:1883".to_string())
}

/// Generate unique client ID with given prefix
///
/// - `get_client_id("vending")` → `"vending_a1b2c3d4"`
pub fn get_client_id(prefix: &str) -> String {
	let uuid = Uuid::new_v4().to_string();
	let short_uuid = &uuid[.. 8];
	format!("{prefix}_{short_uuid}")
}

/// Build complete MQTT URL with a unique client ID
pub fn build_url(client_id_prefix: &str) -> String {
	let base_url = broker_url();
	let client_id = get_client_id(client_id_prefix);

	if base_url.contains('?') {
		format!("{base_url}&client_id={client_id}")
	} else {
		format!("{base_url}?client_id={client_id}")
	}
}

/// Explain a failed connection attempt with a hint on how to fix it
pub fn print_connection_error(url: &str, error: &mqtt_rpc_router::ClientError) {
	eprintln!("Failed to connect to {url}: {error}");
	eprintln!(
		"Start a local broker (e.g. `mosquitto -p 1883`) or point \
		 MQTT_BROKER at a reachable one in demos/.env"
	);
}
