//! # Relay Runtime Library
//!
//! Exposes the runtime's modules for testing. The entry point is the
//! `main.rs` binary.
//!
//! - `container/` - configuration and component wiring
//! - `adapters/` - built-in outputs and renderer
//! - `intake` - stdin reader and per-event dispatcher
//! - `runtime` - startup and graceful drain

pub mod adapters;
pub mod container;
pub mod intake;
pub mod runtime;

pub use container::{ConfigError, RelayConfig, RelayContainer};
pub use runtime::RelayRuntime;
