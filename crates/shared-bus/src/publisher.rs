//! # Event Publisher
//!
//! Defines the publishing side of the intake queue.

use crate::events::IntakeEvent;
use crate::subscriber::IntakeSubscription;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Errors from publishing to the intake queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The dispatcher closed the queue; the event was not accepted.
    #[error("Intake queue closed")]
    Closed,
}

/// Trait for feeding events into the dispatcher.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Enqueue an event, waiting while the queue is full.
    async fn publish(&self, event: IntakeEvent) -> Result<(), PublishError>;

    /// Get the total number of events accepted.
    fn events_published(&self) -> u64;
}

/// Producer handle for the bounded intake queue.
///
/// Cheap to clone; every clone feeds the same queue and shares the
/// published counter.
#[derive(Clone)]
pub struct IntakePublisher {
    sender: mpsc::Sender<IntakeEvent>,
    events_published: Arc<AtomicU64>,
    capacity: usize,
}

/// Create a bounded intake queue.
///
/// A capacity of zero is bumped to one; tokio rejects empty channels.
#[must_use]
pub fn intake_channel(capacity: usize) -> (IntakePublisher, IntakeSubscription) {
    let capacity = capacity.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    let publisher = IntakePublisher {
        sender,
        events_published: Arc::new(AtomicU64::new(0)),
        capacity,
    };
    (publisher, IntakeSubscription::new(receiver))
}

impl IntakePublisher {
    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots before producers start blocking.
    #[must_use]
    pub fn available(&self) -> usize {
        self.sender.capacity()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl EventPublisher for IntakePublisher {
    async fn publish(&self, event: IntakeEvent) -> Result<(), PublishError> {
        let id = event.id;
        let bytes = event.len();

        match self.sender.send(event).await {
            Ok(()) => {
                self.events_published.fetch_add(1, Ordering::Relaxed);
                debug!(event_id = %id, bytes, "Event queued");
                Ok(())
            }
            Err(_) => {
                warn!(event_id = %id, "Event dropped (intake queue closed)");
                Err(PublishError::Closed)
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
