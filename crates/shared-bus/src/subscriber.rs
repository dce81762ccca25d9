//! # Intake Subscription
//!
//! Defines the consuming side of the intake queue.

use crate::events::IntakeEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Every publisher was dropped or the queue was closed and drained.
    #[error("Intake queue closed")]
    Closed,
}

/// The single consumer of the intake queue.
pub struct IntakeSubscription {
    receiver: mpsc::Receiver<IntakeEvent>,
    received: u64,
}

impl IntakeSubscription {
    pub(crate) fn new(receiver: mpsc::Receiver<IntakeEvent>) -> Self {
        Self {
            receiver,
            received: 0,
        }
    }

    /// Receive the next event in arrival order.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next queued event
    /// - `None` - The queue is closed and fully drained
    pub async fn recv(&mut self) -> Option<IntakeEvent> {
        let event = self.receiver.recv().await?;
        self.received += 1;
        Some(event)
    }

    /// Try to receive the next event without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available
    /// - `Ok(None)` - No event available (would block)
    /// - `Err(SubscriptionError::Closed)` - The queue is closed and drained
    pub fn try_recv(&mut self) -> Result<Option<IntakeEvent>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(event) => {
                self.received += 1;
                Ok(Some(event))
            }
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Stop accepting new events. Buffered events are still delivered.
    pub fn close(&mut self) {
        debug!(received = self.received, "Intake queue closed");
        self.receiver.close();
    }

    /// Number of events handed to the dispatcher so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }
}
