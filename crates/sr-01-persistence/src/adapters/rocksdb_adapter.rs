//! # RocksDB Storage Adapter
//!
//! Embedded implementation of [`PersistenceProvider`].
//!
//! ## Features
//!
//! - One column family per [`Bucket`]
//! - Atomic batch writes (WriteBatch) for value + expiry pairs and range deletes
//! - Snappy compression
//! - Bloom filters for read optimization
//!
//! ## Locking
//!
//! The provider owns a single `DB` handle behind a mutex. Every logical
//! operation (including check-then-insert and scan-then-delete) runs under
//! one acquisition on the blocking pool, so fsyncs and bucket scans never
//! occupy an async worker and no lock is ever held across an await point.

use crate::domain::{expiry_key, Bucket, StoreError};
use crate::ports::{BackendKind, PersistenceProvider, StoredEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType,
    IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, info};

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: crate::setup::DEFAULT_DB_PATH.to_string(),
            block_cache_size: 64 * 1024 * 1024,  // 64MB
            write_buffer_size: 16 * 1024 * 1024, // 16MB
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,  // 8MB
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed provider
pub struct RocksDbStore {
    db: Arc<Mutex<Option<DB>>>,
    config: RocksDbConfig,
}

fn io_err(context: &str, e: rocksdb::Error) -> StoreError {
    StoreError::io(format!("RocksDB {context} failed: {e}"))
}

fn cf(db: &DB, bucket: Bucket) -> Result<&ColumnFamily, StoreError> {
    db.cf_handle(bucket.as_str())
        .ok_or_else(|| StoreError::io(format!("missing column family {bucket}")))
}

fn write_opts(sync: bool) -> WriteOptions {
    let mut write_opts = WriteOptions::default();
    write_opts.set_sync(sync);
    write_opts
}

fn stage_entry(
    db: &DB,
    batch: &mut WriteBatch,
    bucket: Bucket,
    key: &str,
    value: &[u8],
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), StoreError> {
    batch.put_cf(cf(db, bucket)?, key.as_bytes(), value);
    if let Some(ts) = expires_at {
        batch.put_cf(
            cf(db, Bucket::Expiry)?,
            expiry_key(ts, key).as_bytes(),
            key.as_bytes(),
        );
    }
    Ok(())
}

impl RocksDbStore {
    /// Open or create a RocksDB database
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // Performance tuning
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(DBCompressionType::Snappy);

        // Bloom filter for faster lookups
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Bucket::ALL
            .iter()
            .map(|bucket| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(bucket.as_str(), cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors).map_err(|e| {
            StoreError::Open {
                message: format!("Failed to open RocksDB at {}: {}", config.path, e),
            }
        })?;

        info!("[sr-01] Embedded store opened at {}", config.path);

        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
            config,
        })
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    /// Run `f` against the open handle on the blocking pool, under the store
    /// mutex. The mutex is only ever taken from blocking threads.
    async fn with_db<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&DB, bool) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let sync = self.config.sync_writes;
        spawn_blocking(move || {
            let guard = db.lock();
            let db = guard.as_ref().ok_or(StoreError::Closed)?;
            f(db, sync)
        })
        .await
        .map_err(|e| StoreError::io(format!("RocksDB {op} task failed: {e}")))?
    }
}

#[async_trait]
impl PersistenceProvider for RocksDbStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Embedded
    }

    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let (key, value) = (key.to_string(), value.to_vec());
        self.with_db("put", move |db, sync| {
            let mut batch = WriteBatch::default();
            stage_entry(db, &mut batch, bucket, &key, &value, expires_at)?;
            db.write_opt(batch, &write_opts(sync))
                .map_err(|e| io_err("put", e))
        })
        .await
    }

    async fn put_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let (key, value) = (key.to_string(), value.to_vec());
        self.with_db("insert", move |db, sync| {
            let exists = db
                .get_pinned_cf(cf(db, bucket)?, key.as_bytes())
                .map_err(|e| io_err("exists check", e))?
                .is_some();
            if exists {
                return Ok(false);
            }

            let mut batch = WriteBatch::default();
            stage_entry(db, &mut batch, bucket, &key, &value, expires_at)?;
            db.write_opt(batch, &write_opts(sync))
                .map_err(|e| io_err("insert", e))?;
            Ok(true)
        })
        .await
    }

    async fn get_if_present(
        &self,
        bucket: Bucket,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let key = key.to_string();
        self.with_db("get", move |db, _| {
            db.get_cf(cf(db, bucket)?, key.as_bytes())
                .map_err(|e| io_err("get", e))
        })
        .await
    }

    async fn delete(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let keys = keys.to_vec();
        self.with_db("delete", move |db, sync| {
            let handle = cf(db, bucket)?;
            let mut batch = WriteBatch::default();
            for key in &keys {
                batch.delete_cf(handle, key.as_bytes());
            }
            db.write_opt(batch, &write_opts(sync))
                .map_err(|e| io_err("delete", e))
        })
        .await
    }

    async fn delete_range(
        &self,
        bucket: Bucket,
        upper_bound: &str,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let upper_bound = upper_bound.to_string();
        self.with_db("range delete", move |db, sync| {
            let handle = cf(db, bucket)?;
            let mut removed = Vec::new();
            let mut batch = WriteBatch::default();

            for item in db.iterator_cf(handle, IteratorMode::Start) {
                let (key, value) = item.map_err(|e| io_err("scan", e))?;
                if key.as_ref() > upper_bound.as_bytes() {
                    break;
                }
                batch.delete_cf(handle, &key);
                removed.push(StoredEntry {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    value: value.to_vec(),
                });
            }

            if !removed.is_empty() {
                db.write_opt(batch, &write_opts(sync))
                    .map_err(|e| io_err("range delete", e))?;
                debug!("[sr-01] Removed {} entries from {}", removed.len(), bucket);
            }
            Ok(removed)
        })
        .await
    }

    async fn total_size(&self, bucket: Bucket) -> Result<u64, StoreError> {
        self.with_db("size scan", move |db, _| {
            let mut total = 0u64;
            for item in db.iterator_cf(cf(db, bucket)?, IteratorMode::Start) {
                let (key, value) = item.map_err(|e| io_err("size scan", e))?;
                total += (key.len() + value.len()) as u64;
            }
            Ok(total)
        })
        .await
    }

    async fn purge_bucket(&self, bucket: Bucket) -> Result<(), StoreError> {
        self.with_db("purge", move |db, sync| {
            let handle = cf(db, bucket)?;
            let mut batch = WriteBatch::default();
            for item in db.iterator_cf(handle, IteratorMode::Start) {
                let (key, _) = item.map_err(|e| io_err("purge scan", e))?;
                batch.delete_cf(handle, &key);
            }
            db.write_opt(batch, &write_opts(sync))
                .map_err(|e| io_err("purge", e))
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        let closed = spawn_blocking(move || -> Result<bool, StoreError> {
            let Some(db) = db.lock().take() else {
                return Ok(false);
            };
            db.flush().map_err(|e| io_err("flush", e))?;
            drop(db);
            Ok(true)
        })
        .await
        .map_err(|e| StoreError::io(format!("RocksDB close task failed: {e}")))??;
        if closed {
            info!("[sr-01] Embedded store closed");
        }
        Ok(())
    }
}
