//! # Dispatch (sr-06)
//!
//! Routes inbound scan messages to their outputs: dedup, then either an
//! immediate send or a trip through the aggregation buffer, flushed by
//! count or by the route timer.
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | [`DispatchContext`] | storage-backed collaborators shared by everything below |
//! | [`DispatchEngine`] | per message/route/output decision |
//! | [`Router`] | route, output and template registry; message entry point |
//!
//! Sinks, rendering and policy are consumed through the traits in
//! [`ports`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod context;
pub mod engine;
pub mod error;
pub mod ports;
pub mod router;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use context::DispatchContext;
pub use engine::{DispatchEngine, DispatchOutcome, DispatchTarget, InboundMessage};
pub use error::{DispatchError, OutputError, RenderError};
pub use ports::{AcceptAll, InputCallback, Output, OutputFactory, PolicyEvaluator, Renderer};
pub use router::Router;
