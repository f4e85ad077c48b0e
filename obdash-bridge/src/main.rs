//! obdash: BLE ELM327 OBD2 adapter bridged to an HTTP telemetry endpoint
//!
//! One task polls the adapter over BLE on a fixed command cycle, one task
//! serves the latest decoded snapshot as JSON. They share nothing but the
//! telemetry store, so a dead adapter still leaves the endpoint answering
//! with defaults.

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

mod ble;
mod bridge;
mod config;
mod http_server;
mod store;
mod transport;

use config::{BridgeConfig, DEFAULT_HTTP_PORT};
use store::TelemetryStore;

#[derive(Parser, Debug)]
#[command(name = "obdash", version, about)]
struct Args {
    /// BLE address of the ELM327 adapter (e.g. "AA:BB:CC:DD:EE:FF")
    address: String,
    /// Port for the telemetry HTTP endpoint
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    http_port: u16,
    /// Dwell interval between PID commands, in milliseconds
    #[arg(long, default_value_t = 2000)]
    dwell_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Exit code 1 on usage errors, matching the original tooling
    let args = Args::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(1);
    });

    let mut config = BridgeConfig::new(&args.address);
    config.dwell = Duration::from_millis(args.dwell_ms);

    let store = TelemetryStore::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Bind failure refuses startup; everything past this point is resilient
    let listener = TcpListener::bind(("0.0.0.0", args.http_port)).await?;
    info!("Telemetry endpoint on http://0.0.0.0:{}", args.http_port);

    let http_task = tokio::spawn(http_server::run(
        listener,
        store.clone(),
        shutdown_rx.clone(),
    ));

    let bridge_task = tokio::spawn(async move {
        if let Err(e) = bridge::run(config, store, shutdown_rx).await {
            // The HTTP side keeps serving defaults
            error!("Bridge stopped: {e}");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);

    let _ = bridge_task.await;
    let _ = http_task.await;
    Ok(())
}
