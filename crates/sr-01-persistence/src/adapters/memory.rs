use crate::domain::{expiry_key, Bucket, StoreError};
use crate::ports::{BackendKind, PersistenceProvider, StoredEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

type Buckets = HashMap<Bucket, BTreeMap<String, Vec<u8>>>;

/// In-memory provider for unit tests.
///
/// Ordered per bucket like the embedded store. `set_unavailable(true)` makes
/// every call fail with an I/O error, for exercising error paths.
pub struct InMemoryStore {
    data: Mutex<Option<Buckets>>,
    unavailable: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Some(HashMap::new())),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of entries in a bucket.
    pub fn len(&self, bucket: Bucket) -> usize {
        self.data
            .lock()
            .as_ref()
            .and_then(|buckets| buckets.get(&bucket).map(BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, bucket: Bucket) -> bool {
        self.len(bucket) == 0
    }

    /// Keys of a bucket in ascending order.
    pub fn keys(&self, bucket: Bucket) -> Vec<String> {
        self.data
            .lock()
            .as_ref()
            .and_then(|buckets| buckets.get(&bucket).map(|b| b.keys().cloned().collect()))
            .unwrap_or_default()
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut Buckets) -> T) -> Result<T, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::io("in-memory store marked unavailable"));
        }
        let mut guard = self.data.lock();
        let buckets = guard.as_mut().ok_or(StoreError::Closed)?;
        Ok(f(buckets))
    }
}

fn write_entry(
    buckets: &mut Buckets,
    bucket: Bucket,
    key: &str,
    value: &[u8],
    expires_at: Option<DateTime<Utc>>,
) {
    buckets
        .entry(bucket)
        .or_default()
        .insert(key.to_string(), value.to_vec());
    if let Some(ts) = expires_at {
        buckets
            .entry(Bucket::Expiry)
            .or_default()
            .insert(expiry_key(ts, key), key.as_bytes().to_vec());
    }
}

#[async_trait]
impl PersistenceProvider for InMemoryStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.with_data(|buckets| write_entry(buckets, bucket, key, value, expires_at))
    }

    async fn put_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        self.with_data(|buckets| {
            let exists = buckets
                .get(&bucket)
                .is_some_and(|entries| entries.contains_key(key));
            if !exists {
                write_entry(buckets, bucket, key, value, expires_at);
            }
            !exists
        })
    }

    async fn get_if_present(
        &self,
        bucket: Bucket,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_data(|buckets| buckets.get(&bucket).and_then(|b| b.get(key).cloned()))
    }

    async fn delete(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError> {
        self.with_data(|buckets| {
            if let Some(entries) = buckets.get_mut(&bucket) {
                for key in keys {
                    entries.remove(key);
                }
            }
        })
    }

    async fn delete_range(
        &self,
        bucket: Bucket,
        upper_bound: &str,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        self.with_data(|buckets| {
            let Some(entries) = buckets.get_mut(&bucket) else {
                return Vec::new();
            };
            // split_off keeps keys >= bound in the tail; move the bound itself
            // back to the expired side.
            let mut kept = entries.split_off(upper_bound);
            if let Some(value) = kept.remove(upper_bound) {
                entries.insert(upper_bound.to_string(), value);
            }
            let expired = std::mem::replace(entries, kept);
            expired
                .into_iter()
                .map(|(key, value)| StoredEntry { key, value })
                .collect()
        })
    }

    async fn total_size(&self, bucket: Bucket) -> Result<u64, StoreError> {
        self.with_data(|buckets| {
            buckets
                .get(&bucket)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(k, v)| (k.len() + v.len()) as u64)
                        .sum()
                })
                .unwrap_or(0)
        })
    }

    async fn purge_bucket(&self, bucket: Bucket) -> Result<(), StoreError> {
        self.with_data(|buckets| {
            buckets.remove(&bucket);
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.data.lock().take();
        Ok(())
    }
}
