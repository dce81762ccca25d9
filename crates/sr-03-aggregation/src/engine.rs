//! # Aggregation Engine
//!
//! ## Batch order
//!
//! The incoming entry goes first, followed by whatever was already buffered,
//! so a persisted batch reads newest-first.
//!
//! ## Flush rules
//!
//! | Condition | Result |
//! |-----------|--------|
//! | `ignore_quantity` | buffer, never flush by count |
//! | `len < capacity` | buffer |
//! | otherwise (incl. `capacity == 0`) | persist an empty bucket, return the batch |

use crate::error::AggregationError;
use crate::locks::KeyedLocks;
use shared_types::RenderedScan;
use sr_01_persistence::{Bucket, PersistenceProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Aggregation bucket key for one route output.
pub fn aggregation_key(route: &str, output: &str) -> String {
    format!("{route}/{output}")
}

pub struct AggregationEngine {
    provider: Arc<dyn PersistenceProvider>,
    locks: KeyedLocks,
}

impl AggregationEngine {
    pub fn new(provider: Arc<dyn PersistenceProvider>) -> Self {
        Self {
            provider,
            locks: KeyedLocks::new(),
        }
    }

    /// Add `current` to the batch for `key` and flush it when full.
    ///
    /// Returns the flushed batch, or `None` while the batch keeps growing.
    /// Nothing is returned for an empty batch even when the rules say flush.
    pub async fn aggregate(
        &self,
        key: &str,
        current: Option<RenderedScan>,
        capacity: usize,
        ignore_quantity: bool,
    ) -> Result<Option<Vec<RenderedScan>>, AggregationError> {
        let _guard = self.locks.lock(key).await;

        let mut batch = Vec::new();
        if let Some(entry) = current.filter(|e| !e.is_empty()) {
            batch.push(entry);
        }
        batch.extend(self.load(key).await?);

        if ignore_quantity || batch.len() < capacity {
            let encoded = encode(key, &batch)?;
            self.provider
                .put(Bucket::Aggregation, key, &encoded, None)
                .await?;
            debug!("[sr-03] Buffered {} entries for {}", batch.len(), key);
            return Ok(None);
        }

        self.provider.put(Bucket::Aggregation, key, &[], None).await?;
        if batch.is_empty() {
            return Ok(None);
        }
        info!("[sr-03] Flushing {} entries for {}", batch.len(), key);
        Ok(Some(batch))
    }

    /// Flush whatever is buffered for `key`, regardless of count.
    pub async fn flush(&self, key: &str) -> Result<Option<Vec<RenderedScan>>, AggregationError> {
        self.aggregate(key, None, 0, false).await
    }

    /// Buffered entries for `key` without modifying them.
    pub async fn pending(&self, key: &str) -> Result<Vec<RenderedScan>, AggregationError> {
        let _guard = self.locks.lock(key).await;
        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<Vec<RenderedScan>, AggregationError> {
        match self.provider.get_if_present(Bucket::Aggregation, key).await? {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_slice(&raw).map_err(|e| AggregationError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
            _ => Ok(Vec::new()),
        }
    }
}

fn encode(key: &str, batch: &[RenderedScan]) -> Result<Vec<u8>, AggregationError> {
    serde_json::to_vec(batch).map_err(|e| AggregationError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_01_persistence::InMemoryStore;

    fn entry(title: &str) -> RenderedScan {
        RenderedScan::from([("title".to_string(), title.to_string())])
    }

    fn make_engine() -> (Arc<InMemoryStore>, AggregationEngine) {
        let provider = Arc::new(InMemoryStore::new());
        (provider.clone(), AggregationEngine::new(provider))
    }

    #[tokio::test]
    async fn test_count_flush_at_capacity() {
        let (_, engine) = make_engine();
        let key = aggregation_key("route1", "slack");

        assert!(engine.aggregate(&key, Some(entry("1")), 3, false).await.unwrap().is_none());
        assert_eq!(engine.pending(&key).await.unwrap().len(), 1);

        assert!(engine.aggregate(&key, Some(entry("2")), 3, false).await.unwrap().is_none());
        assert_eq!(engine.pending(&key).await.unwrap().len(), 2);

        let batch = engine
            .aggregate(&key, Some(entry("3")), 3, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch, vec![entry("3"), entry("2"), entry("1")]);
        assert!(engine.pending(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_capacity_flushes_first_message() {
        let (_, engine) = make_engine();
        let batch = engine
            .aggregate("r/o", Some(entry("only")), 0, false)
            .await
            .unwrap();
        assert_eq!(batch, Some(vec![entry("only")]));
    }

    #[tokio::test]
    async fn test_ignore_quantity_only_flushes_on_tick() {
        let (_, engine) = make_engine();
        for i in 0..5 {
            let flushed = engine
                .aggregate("r/o", Some(entry(&i.to_string())), 0, true)
                .await
                .unwrap();
            assert!(flushed.is_none());
        }

        let batch = engine.flush("r/o").await.unwrap().unwrap();
        assert_eq!(batch.len(), 5);
        assert!(engine.flush("r/o").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_empty_bucket() {
        let (provider, engine) = make_engine();
        assert!(engine.flush("r/o").await.unwrap().is_none());
        assert_eq!(
            provider.get_if_present(Bucket::Aggregation, "r/o").await.unwrap(),
            Some(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_empty_current_is_skipped() {
        let (_, engine) = make_engine();
        engine
            .aggregate("r/o", Some(RenderedScan::new()), 10, false)
            .await
            .unwrap();
        assert!(engine.pending("r/o").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (_, engine) = make_engine();
        engine.aggregate("r/a", Some(entry("a")), 10, false).await.unwrap();
        engine.aggregate("r/b", Some(entry("b")), 10, false).await.unwrap();

        assert_eq!(engine.flush("r/a").await.unwrap(), Some(vec![entry("a")]));
        assert_eq!(engine.pending("r/b").await.unwrap(), vec![entry("b")]);
    }

    #[tokio::test]
    async fn test_corrupt_batch_fails_only_that_call() {
        let (provider, engine) = make_engine();
        provider
            .put(Bucket::Aggregation, "r/o", b"not json", None)
            .await
            .unwrap();

        assert!(matches!(
            engine.aggregate("r/o", Some(entry("x")), 3, false).await,
            Err(AggregationError::Serialization { .. })
        ));
        // Other keys keep working.
        assert!(engine
            .aggregate("r/other", Some(entry("x")), 3, false)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let (_, engine) = make_engine();
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..25 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .aggregate("r/o", Some(entry(&i.to_string())), 1000, false)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_none());
        }

        assert_eq!(engine.pending("r/o").await.unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let (provider, engine) = make_engine();
        provider.set_unavailable(true);
        assert!(matches!(
            engine.aggregate("r/o", Some(entry("x")), 3, false).await,
            Err(AggregationError::Store(_))
        ));
    }
}
