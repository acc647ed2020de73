//! Relay Bot - Main entry point.

use anyhow::Result;
use relay_bot::start_server;
use relay_common::logging::init_logging;
use relay_common::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (file + env overrides)
    let config = Config::load()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Relay Bot v{}", env!("CARGO_PKG_VERSION"));

    // Fail fast on missing credentials
    config.validate()?;

    // Start the HTTP server
    start_server(&config).await
}
