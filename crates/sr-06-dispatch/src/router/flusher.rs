//! Timer tick handler that flushes every output of a route.

use super::RouterState;
use crate::engine::DispatchEngine;
use async_trait::async_trait;
use parking_lot::RwLock;
use sr_05_scheduler::TickHandler;
use std::sync::Weak;
use tracing::{debug, error, warn};

/// Holds weak handles: the scheduler registry lives inside the dispatch
/// context, so strong ones would keep the router alive forever.
pub(crate) struct RouteFlusher {
    engine: Weak<DispatchEngine>,
    state: Weak<RwLock<RouterState>>,
}

impl RouteFlusher {
    pub(crate) fn new(engine: Weak<DispatchEngine>, state: Weak<RwLock<RouterState>>) -> Self {
        Self { engine, state }
    }
}

#[async_trait]
impl TickHandler for RouteFlusher {
    async fn on_tick(&self, route: &str) {
        let (Some(engine), Some(state)) = (self.engine.upgrade(), self.state.upgrade()) else {
            debug!("[sr-06] Router gone, ignoring tick for {}", route);
            return;
        };

        let targets = {
            let state = state.read();
            match state.route(route) {
                Some(r) => state.targets(r),
                None => return,
            }
        };

        for (name, target) in targets {
            let target = match target {
                Ok(target) => target,
                Err(e) => {
                    warn!("[sr-06] Timer flush of route {} skips {}: {}", route, name, e);
                    continue;
                }
            };
            if let Err(e) = engine.flush(route, &target).await {
                error!("[sr-06] Timer flush of route {} to {} failed: {}", route, name, e);
            }
        }
    }
}
