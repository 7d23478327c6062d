//! Standalone collection URI registry binary
//!
//! Serves the authoritative collection-name-to-URI map over HTTP and
//! persists it to a JSON config file.
//!
//! ## Usage
//!
//! ```bash
//! # Run with defaults (port 3000, ./grove-uris.json)
//! cargo run -p registry
//!
//! # Override the port and config path
//! cargo run -p registry -- --port 8080 --config /var/lib/registry/uris.json
//!
//! # Set log level
//! RUST_LOG=debug cargo run -p registry
//! ```
//!
//! ## Environment Variables
//!
//! - `REGISTRY_PORT`: Listen port (default: 3000)
//! - `REGISTRY_CONFIG`: Path of the JSON config file (default: grove-uris.json)
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use registry::AppState;

#[derive(Parser, Debug)]
#[clap(name = "registry")]
#[clap(about = "Collection URI registry - authoritative pointer map for collection blobs")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Port to listen on
    #[clap(long, default_value = "3000", env = "REGISTRY_PORT")]
    port: u16,

    /// Path of the JSON config file holding the URI map
    #[clap(long, default_value = "grove-uris.json", env = "REGISTRY_CONFIG")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("registry={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!("Starting URI registry v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Port: {}", args.port);
    info!("  Config file: {}", args.config);

    let state = Arc::new(AppState::load(&args.config).await?);
    let app = registry::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received CTRL+C signal, shutting down gracefully...");
        })
        .await
        .context("server error")?;

    info!("URI registry stopped");
    Ok(())
}
