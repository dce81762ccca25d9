//! Domain layer: buckets, TTL key encoding and errors.

pub mod bucket;
pub mod errors;
pub mod ttl;

pub use bucket::Bucket;
pub use errors::{SetupError, StoreError};
pub use ttl::{expiry_key, format_timestamp, sweep_bound, TIMESTAMP_FORMAT};
