//! # Relay Runtime
//!
//! Owns the long-running tasks and the drain order.
//!
//! ## Shutdown Sequence
//!
//! 1. Stop route timers (in-flight flushes finish)
//! 2. Close the intake queue and dispatch what is buffered
//! 3. Wait for every in-flight dispatch task
//! 4. Terminate outputs
//! 5. Stop the reaper and close the store

use crate::container::{RelayConfig, RelayContainer};
use crate::intake::run_dispatcher;
use anyhow::{Context, Result};
use shared_bus::{intake_channel, IntakePublisher};
use sr_01_persistence::PersistenceProvider;
use sr_04_reaper::Reaper;
use sr_06_dispatch::{OutputFactory, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct RelayRuntime {
    provider: Arc<dyn PersistenceProvider>,
    router: Arc<Router>,
    publisher: IntakePublisher,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: JoinHandle<u64>,
    reaper: JoinHandle<()>,
}

impl RelayRuntime {
    /// Build every component and start the background tasks.
    pub async fn start(config: RelayConfig, factory: Arc<dyn OutputFactory>) -> Result<Self> {
        info!("===========================================");
        info!("  Scan Relay Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let container = RelayContainer::build(&config, factory).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reaper = Arc::new(Reaper::new(
            Arc::clone(&container.provider),
            container.retention.clone(),
        ))
        .spawn(shutdown_rx.clone());

        let (publisher, subscription) = intake_channel(config.queue_capacity);
        let dispatcher = tokio::spawn(run_dispatcher(
            subscription,
            Arc::clone(&container.router),
            shutdown_rx,
        ));

        info!(
            "Relay started: {} routes, queue capacity {}",
            container.router.routes().len(),
            publisher.capacity()
        );

        Ok(Self {
            provider: container.provider,
            router: container.router,
            publisher,
            shutdown_tx,
            dispatcher,
            reaper,
        })
    }

    /// A producer handle for the intake queue.
    pub fn publisher(&self) -> IntakePublisher {
        self.publisher.clone()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Drain and stop. Returns the number of events dispatched.
    pub async fn shutdown(self) -> Result<u64> {
        info!("Initiating graceful shutdown...");

        self.router.engine().context().schedulers.stop_all().await;

        if self.shutdown_tx.send(true).is_err() {
            error!("Background tasks exited before the shutdown signal");
        }
        let dispatched = self.dispatcher.await.context("Dispatcher task failed")?;

        self.router.terminate().await;

        if let Err(e) = self.reaper.await {
            error!("[sr-04] Reaper task failed: {}", e);
        }
        self.provider
            .close()
            .await
            .context("Failed to close storage")?;

        info!("Shutdown complete ({} events dispatched)", dispatched);
        Ok(dispatched)
    }
}
