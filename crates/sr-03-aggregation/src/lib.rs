//! # Aggregation (sr-03)
//!
//! Accumulates rendered scan entries per route output and hands back a
//! batch once it is full or a timer asks for it.
//!
//! Batches live in [`Bucket::Aggregation`](sr_01_persistence::Bucket) so a
//! restart does not lose buffered entries. Read-modify-write cycles are
//! serialized per key; different keys proceed in parallel.

pub mod engine;
pub mod error;
pub mod locks;

pub use engine::{aggregation_key, AggregationEngine};
pub use error::AggregationError;
pub use locks::KeyedLocks;
