//! API gateway binary.
//!
//! Loads the configuration, builds every endpoint handler (aborting on any
//! configuration error before a socket is bound), then serves until SIGINT
//! or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::load_config;
use api_gateway::decorator::InvocationStats;
use api_gateway::lifecycle::{build_server, signals, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::RendererRegistry;

#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about = "API gateway with backend fan-out and merge")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Listener port; overrides the configured bind address port.
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Log level; overrides the configured level.
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Enable the debug echo endpoint.
    #[arg(short = 'd', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}: {}", cli.config.display(), e);
            std::process::exit(1);
        }
    };

    if let Some(port) = cli.port {
        config.listener.set_port(port);
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level.to_ascii_lowercase();
    }
    config.debug = config.debug || cli.debug;

    logging::init(&config.observability.log_level, config.observability.json_logs);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");

    let registry = RendererRegistry::with_defaults();
    let stats = Arc::new(InvocationStats::default());

    let server = match build_server(&config, &registry, stats) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        endpoints = config.endpoints.len(),
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
