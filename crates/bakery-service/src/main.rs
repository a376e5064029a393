//! Main entry point for the bakery order service.
//!
//! Loads the TOML configuration, wires the configured storage backend into
//! the order book and admin gate, and serves the HTTP API until interrupted.

use bakery_config::Config;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the bakery service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG wins over --log-level
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!(
		"Loaded configuration [{}] from {}",
		config.service.name,
		args.config.display()
	);

	let bakery = Arc::new(factory_registry::build_bakery_from_config(config)?);
	let cleanup = bakery.spawn_storage_cleanup();

	let result = server::start_server(bakery).await;
	cleanup.abort();
	result?;

	tracing::info!("Stopped bakery service");
	Ok(())
}
