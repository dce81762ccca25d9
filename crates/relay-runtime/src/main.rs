//! # Scan Relay Runtime
//!
//! Reads newline-delimited JSON scan events from stdin and relays them to
//! the configured outputs.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (stderr; stdout carries the built-in outputs)
//! 2. Load configuration from the environment
//! 3. Open storage, load settings, start the reaper and dispatcher
//! 4. Forward stdin into the intake queue
//!
//! The process drains and exits on Ctrl-C or when stdin closes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use relay_runtime::adapters::BuiltinOutputFactory;
use relay_runtime::intake::forward_lines;
use relay_runtime::{RelayConfig, RelayRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RelayConfig::from_env().context("Invalid configuration")?;
    let runtime = RelayRuntime::start(config, Arc::new(BuiltinOutputFactory)).await?;

    let mut input = tokio::spawn(forward_lines(
        BufReader::new(tokio::io::stdin()),
        runtime.publisher(),
    ));

    info!("Relay is running. Reading events from stdin, Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Ctrl+C received");
            input.abort();
        }
        read = &mut input => match read {
            Ok(Ok(count)) => info!("stdin closed after {} events", count),
            Ok(Err(e)) => error!("Failed to read stdin: {}", e),
            Err(e) => error!("stdin reader failed: {}", e),
        },
    }

    runtime.shutdown().await?;
    Ok(())
}
