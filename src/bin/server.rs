//! Aggregation Server Binary
//!
//! Starts the TCP server for the weather aggregation engine.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use weather_aggregator::config::DEFAULT_PORT;
use weather_aggregator::network::Server;
use weather_aggregator::{Config, Engine};

/// Weather Aggregation Server
#[derive(Parser, Debug)]
#[command(name = "aggregation-server")]
#[command(about = "Aggregates weather station updates with Lamport ordering")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Data directory
    #[arg(short, long, default_value = "./aggregator_data")]
    data_dir: String,

    /// Seconds without an update before a station is dropped
    #[arg(short, long, default_value = "30")]
    ttl_secs: u64,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,weather_aggregator=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Aggregation Server v{}", weather_aggregator::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(format!("{}:{}", args.host, args.port))
        .station_ttl_secs(args.ttl_secs)
        .max_connections(args.max_connections)
        .build();

    // Open engine (reloads persisted stations before accepting connections)
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized with {} stations", engine.store().len());

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
