//! # Persistence (sr-01)
//!
//! Durable bucketed key/value storage for the relay: dedup records and their
//! TTL index, aggregation buffers, invocation counters and shared settings.
//!
//! ## Backends
//!
//! | Backend | Type | Used for |
//! |---------|------|----------|
//! | Embedded | [`RocksDbStore`] | single-node deployments |
//! | Relational | [`RelationalStore`] | Postgres (SQLite in dev/tests), tenant-scoped |
//! | Memory | [`InMemoryStore`] | unit tests |
//!
//! All three implement [`PersistenceProvider`]; exactly one is opened per
//! process through [`configure_storage`].
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - buckets, TTL key encoding, errors
//! - `ports/` - provider contract (outbound) and bookkeeping API (inbound)
//! - `adapters/` - backends
//! - `setup.rs` - backend selection
//! - `service/` - bookkeeping on top of a provider
//!
//! ## Usage
//!
//! ```ignore
//! use sr_01_persistence::{configure_storage, Bucket, StorageConfig};
//!
//! let provider = configure_storage(&StorageConfig::new("./data/relay", None, None)).await?;
//! provider.put(Bucket::Messages, "fp", b"{}", None).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod setup;

pub use adapters::InMemoryStore;
#[cfg(feature = "relational")]
pub use adapters::{PoolConfig, RelationalStore};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbStore};
pub use domain::{
    expiry_key, format_timestamp, sweep_bound, Bucket, SetupError, StoreError, TIMESTAMP_FORMAT,
};
pub use ports::{BackendKind, BookkeepingApi, PersistenceProvider, StoredEntry};
pub use service::{BookkeepingService, API_KEY_NAME, CONFIG_SNAPSHOT_NAME};
pub use setup::{configure_storage, StorageConfig, DEFAULT_DB_PATH};
