//! # Shared Bus - Intake Queue
//!
//! Carries raw inbound scan events from the process edge (stdin, HTTP, ...)
//! to the dispatcher.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   publish()    ┌──────────────┐   recv()   ┌──────────────┐
//! │   Producer   │ ─────────────▶ │ Intake Queue │ ─────────▶ │  Dispatcher  │
//! │  (N clones)  │  (blocks when  │  (bounded)   │            │ task/message │
//! └──────────────┘     full)      └──────────────┘            └──────────────┘
//! ```
//!
//! ## Backpressure
//!
//! The queue is bounded: once `capacity` events are buffered, `publish`
//! suspends the producer until the dispatcher catches up. Closing the
//! subscription rejects new events while everything already buffered is
//! still delivered, which is what a graceful drain needs.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{IntakeEvent, IntakeTarget};
pub use publisher::{intake_channel, EventPublisher, IntakePublisher, PublishError};
pub use subscriber::{IntakeSubscription, SubscriptionError};

/// Maximum events to buffer before producers block.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
