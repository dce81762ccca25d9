//! # Intake
//!
//! Moves raw events from the process edge into the router.
//!
//! ```text
//! stdin ──lines──▶ forward_lines ──publish──▶ [bounded queue] ──▶ run_dispatcher
//!                                                                   │
//!                                                       one task per event
//! ```
//!
//! Dispatch starts in arrival order; tasks complete in any order. On
//! shutdown the queue is closed, buffered events are still dispatched, and
//! every in-flight task is awaited.

use shared_bus::{EventPublisher, IntakeEvent, IntakePublisher, IntakeSubscription, IntakeTarget};
use sr_06_dispatch::Router;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Publish every non-blank line of `reader` as a broadcast event.
///
/// Lines are forwarded as raw bytes; a line that is not valid UTF-8 or not
/// JSON is rejected later by the dispatcher, for that event only. Returns
/// the number of events published. Stops early when the queue is closed.
pub async fn forward_lines<R>(mut reader: R, publisher: IntakePublisher) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut forwarded = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        if publisher
            .publish(IntakeEvent::broadcast(line.to_vec()))
            .await
            .is_err()
        {
            warn!("[relay] Intake queue closed, dropping remaining input");
            break;
        }
        forwarded += 1;
    }
    debug!("[relay] Input exhausted after {} events", forwarded);
    Ok(forwarded)
}

/// Dispatch queued events until shutdown, then drain.
///
/// Returns the number of events dispatched.
pub async fn run_dispatcher(
    mut subscription: IntakeSubscription,
    router: Arc<Router>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut tasks = JoinSet::new();
    let mut dispatched = 0;
    let mut closing = false;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed(), if !closing => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("[relay] Closing intake queue, draining buffered events");
                    subscription.close();
                    closing = true;
                }
            }
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let router = Arc::clone(&router);
                tasks.spawn(dispatch_event(router, event));
                dispatched += 1;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    info!("[relay] Dispatcher stopped after {} events", dispatched);
    dispatched
}

async fn dispatch_event(router: Arc<Router>, event: IntakeEvent) {
    let result = match &event.target {
        IntakeTarget::AllRoutes => router.handle(&event.payload).await,
        IntakeTarget::Route(route) => router.handle_route(route, &event.payload).await,
    };
    if let Err(e) = result {
        warn!("[relay] Event {} rejected: {}", event.id, e);
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("[relay] Dispatch task failed: {}", e);
    }
}
