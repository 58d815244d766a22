use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Installs a compact fmt subscriber for the demos.
///
/// `RUST_LOG` wins over `fallback`; with neither set the demo stays quiet.
/// `RUST_LOG_DISABLE=1` turns logging off even when a fallback is given.
///
/// ```bash
/// RUST_LOG=mqtt_rpc_router=debug cargo run --example vending
/// ```
pub fn setup(fallback: Option<&str>) {
	dotenv::from_filename("demos/.env").ok();
	if std::env::var_os("RUST_LOG_DISABLE").is_some() {
		return;
	}

	let filter = match (EnvFilter::try_from_default_env(), fallback) {
		| (Ok(filter), _) => filter,
		| (Err(_), Some(directive)) => EnvFilter::new(directive),
		| (Err(_), None) => return,
	};

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_span_events(FmtSpan::NONE)
		.with_target(true)
		.compact()
		.try_init();
}
