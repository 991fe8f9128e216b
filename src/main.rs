//! LunaTV user-data server

use anyhow::Result;
use clap::Parser;
use lunatv::core::{config::CliArgs, Config, Logger};
use lunatv::ApiServer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let config = match Config::load_with(&cli_args) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't initialized yet
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let _logger = match Logger::init(&config.logging) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return Err(e);
        }
    };

    info!("Starting LunaTV v{}", lunatv::VERSION);
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = %config.storage.backend,
        "Server configuration"
    );
    if config.security.owner_username.is_none() {
        info!("No owner account configured; only registered users can log in");
    }

    let server_url = format!("http://{}:{}", config.server.host, config.server.port);
    let server = ApiServer::new(config)?;

    info!(url = %server_url, "Server ready - starting to serve requests");
    server.serve().await
}
