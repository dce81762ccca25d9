//! # Outbound Ports
//!
//! The persistence contract shared by the embedded, relational and
//! in-memory backends.
//!
//! ## Expiry mirroring
//!
//! A write carrying `expires_at` also writes
//! `expiry[expiry_key(expires_at, key)] = key` in the same atomic unit
//! (RocksDB `WriteBatch`, SQL transaction), so every expiring record always
//! has its expiry entry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::domain::{Bucket, StoreError};

/// A key/value pair returned by range deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Which backend serves a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Embedded,
    Relational,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::Embedded => f.write_str("rocksdb"),
            BackendKind::Relational => f.write_str("relational"),
        }
    }
}

/// Durable, bucketed key/value storage with a TTL index.
///
/// Each method is one logical operation; concurrent callers never observe a
/// partially applied write.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Insert or overwrite `key`.
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Insert `key` only if it does not exist yet.
    ///
    /// Returns `false` when the key was already present; nothing is written
    /// in that case, including the expiry entry.
    async fn put_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    async fn get_if_present(&self, bucket: Bucket, key: &str)
        -> Result<Option<Vec<u8>>, StoreError>;

    /// Delete the given keys. Missing keys are ignored.
    async fn delete(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError>;

    /// Delete and return every entry with `key <= upper_bound`, ascending.
    async fn delete_range(
        &self,
        bucket: Bucket,
        upper_bound: &str,
    ) -> Result<Vec<StoredEntry>, StoreError>;

    /// Bytes held by the bucket (keys plus values).
    async fn total_size(&self, bucket: Bucket) -> Result<u64, StoreError>;

    /// Remove every entry in the bucket.
    async fn purge_bucket(&self, bucket: Bucket) -> Result<(), StoreError>;

    /// Release the backend. Later calls fail with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}
