//! Pensieve MCP server entry point.

use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::{error, info};

use pensieve::config::{AppConfig, Cli, Command};
use pensieve::{server, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    let config = match AppConfig::from_cli(&cli)
        .map_err(pensieve::error::PensieveError::from)
        .and_then(|cfg| cfg.validate().map(|()| cfg))
    {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            // Display is "Configuration error: ..."
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    telemetry::init(config.logging.json);

    info!(
        name: "config.loaded",
        snapshot_path = %config.store.snapshot_path.display(),
        provider = ?config.embedding.provider,
        interval_secs = config.store.crystallize_interval_secs,
        "Configuration loaded"
    );

    let result = match AppConfig::command(&cli) {
        Command::Serve => server::run_server(config).await,
        Command::Inspect {
            server_cmd,
            server_args,
        } => server::run_inspect(server_cmd, server_args).await,
    };

    if let Err(e) = result {
        error!(name: "pensieve.failed", error = %format!("{e:#}"), "Fatal error");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
