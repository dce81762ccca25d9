//! # Reaper (sr-04)
//!
//! Keeps the dedup bucket bounded.
//!
//! - **Expiry sweep**: removes every dedup record whose window has passed,
//!   found through the TTL index in [`Bucket::Expiry`]. Records without an
//!   expiry are never visited.
//! - **Size sweep**: when [`Bucket::Messages`] grows past the configured
//!   limit, the whole bucket is purged.
//!
//! Both sweeps are idempotent. The periodic task runs the size sweep first,
//! then the expiry sweep, and never lets an error escape.

pub mod config;
pub mod reaper;

pub use config::RetentionConfig;
pub use reaper::Reaper;

pub use sr_01_persistence::Bucket;
