//! EcoWatt Cloud — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  axum router      LogEventSink     Memory/DirBlobStore         │
//! │  (HTTP driver)    (EventSink)      (BlobStore)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              CloudService (pure logic)                 │    │
//! │  │  Registry · Authenticator · Queues · FOTA · Telemetry  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use ecowatt_cloud::CloudService;
use ecowatt_cloud::adapters::blob_store::{DirBlobStore, MemoryBlobStore};
use ecowatt_cloud::adapters::http;
use ecowatt_cloud::adapters::log_sink::LogEventSink;
use ecowatt_cloud::app::ports::BlobStore;
use ecowatt_cloud::config::{CONFIG_ENV, ServerConfig};
use ecowatt_cloud::error::Error;

#[derive(Debug, Parser)]
#[command(
    name = "ecowatt-cloud",
    version,
    about = "Device check-in, configuration and firmware delivery server"
)]
struct Args {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("EcoWatt Cloud v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let args = Args::parse();
    let config = ServerConfig::load(args.config.as_deref()).context("loading configuration")?;
    if config.devices.is_empty() {
        warn!("No devices registered; every check-in will be rejected");
    }

    // ── 3. Adapters ───────────────────────────────────────────
    let blobs: Arc<dyn BlobStore> = match &config.firmware_dir {
        Some(dir) => Arc::new(
            DirBlobStore::open(dir.clone())
                .map_err(Error::from)
                .with_context(|| format!("opening firmware directory {}", dir.display()))?,
        ),
        None => {
            warn!("No firmware_dir configured; firmware is kept in memory only");
            Arc::new(MemoryBlobStore::new())
        }
    };

    // ── 4. Service + HTTP ─────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let service = Arc::new(CloudService::new(config, blobs, Arc::new(LogEventSink::new())));
    let app = http::router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
