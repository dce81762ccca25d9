//! # Shared Types Crate
//!
//! Domain types shared across the relay subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: routes, plugin settings and tenant settings
//!   are defined once here and read by every subsystem.
//! - **Messages stay opaque**: an inbound event is a parsed JSON object; the
//!   core never interprets it beyond field lookups for fingerprinting.

pub mod entities;
pub mod errors;
pub mod message;

pub use entities::*;
pub use errors::*;
pub use message::*;
