//! # Scheduler

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Longest accepted tick period (about thirty years). Longer settings are
/// clamped so the first deadline always fits in an `Instant`.
pub const MAX_PERIOD: Duration = Duration::from_secs(30 * 365 * 86_400);

/// Callback run on every timer tick.
#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn on_tick(&self, route: &str);
}

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Recurring timer for one route.
pub struct RouteScheduler {
    route: String,
    period: Duration,
    handler: Arc<dyn TickHandler>,
    running: Mutex<Option<Running>>,
}

impl RouteScheduler {
    pub fn new(route: impl Into<String>, period: Duration, handler: Arc<dyn TickHandler>) -> Self {
        let route = route.into();
        if period > MAX_PERIOD {
            warn!(
                "[sr-05] Period {:?} for route {} clamped to {:?}",
                period, route, MAX_PERIOD
            );
        }
        Self {
            route,
            period: period.min(MAX_PERIOD),
            handler,
            running: Mutex::new(None),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Start ticking. Returns `false` when already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let route = self.route.clone();
        let handler = Arc::clone(&self.handler);
        let period = self.period;

        let handle = tokio::spawn(async move {
            let now = Instant::now();
            let first = now
                .checked_add(period)
                .or_else(|| now.checked_add(MAX_PERIOD))
                .unwrap_or(now);
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        debug!("[sr-05] Tick for route {}", route);
                        handler.on_tick(&route).await;
                    }
                }
            }
            debug!("[sr-05] Timer for route {} stopped", route);
        });

        *running = Some(Running { stop_tx, handle });
        info!(
            "[sr-05] Scheduler started for route {} (every {:?})",
            self.route, self.period
        );
        true
    }

    /// Stop ticking. Idempotent; returns the timer task if it was running.
    ///
    /// A tick handler already in progress runs to completion.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let running = self.running.lock().take()?;
        if running.stop_tx.send(true).is_err() {
            warn!("[sr-05] Timer for route {} had already exited", self.route);
        }
        info!("[sr-05] Scheduler stopped for route {}", self.route);
        Some(running.handle)
    }

    /// Stop and wait for an in-flight tick to finish.
    pub async fn stop_and_wait(&self) {
        if let Some(handle) = self.stop() {
            if let Err(e) = handle.await {
                warn!("[sr-05] Timer task for route {} failed: {}", self.route, e);
            }
        }
    }
}

impl Drop for RouteScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.stop_tx.send(true);
        }
    }
}

/// All route schedulers of a router, keyed by route name.
#[derive(Default)]
pub struct SchedulerRegistry {
    schedulers: Mutex<HashMap<String, Arc<RouteScheduler>>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a timer for `route`, replacing any previous one.
    ///
    /// Returns `false` and starts nothing when `interval_seconds` is zero.
    pub fn start_route(
        &self,
        route: &str,
        interval_seconds: u64,
        handler: Arc<dyn TickHandler>,
    ) -> bool {
        self.stop_route(route);
        if interval_seconds == 0 {
            return false;
        }

        let scheduler = Arc::new(RouteScheduler::new(
            route,
            Duration::from_secs(interval_seconds),
            handler,
        ));
        scheduler.start();
        self.schedulers.lock().insert(route.to_string(), scheduler);
        true
    }

    /// Stop the timer for `route`. Returns `true` if one existed.
    pub fn stop_route(&self, route: &str) -> bool {
        let removed = self.schedulers.lock().remove(route);
        match removed {
            Some(scheduler) => {
                scheduler.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every timer and wait for in-flight ticks.
    pub async fn stop_all(&self) {
        let schedulers: Vec<_> = self.schedulers.lock().drain().map(|(_, s)| s).collect();
        for scheduler in schedulers {
            scheduler.stop_and_wait().await;
        }
    }

    pub fn is_running(&self, route: &str) -> bool {
        self.schedulers
            .lock()
            .get(route)
            .is_some_and(|s| s.is_running())
    }

    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<_> = self.schedulers.lock().keys().cloned().collect();
        routes.sort();
        routes
    }

    pub fn len(&self) -> usize {
        self.schedulers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
