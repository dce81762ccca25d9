//! Adapters layer: concrete [`PersistenceProvider`](crate::ports::PersistenceProvider)
//! backends.

pub mod memory;
#[cfg(feature = "relational")]
pub mod relational;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

pub use memory::InMemoryStore;
#[cfg(feature = "relational")]
pub use relational::{PoolConfig, RelationalStore};
#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};
