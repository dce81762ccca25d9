//! # Reaper

use crate::config::RetentionConfig;
use chrono::{DateTime, Utc};
use sr_01_persistence::{sweep_bound, Bucket, PersistenceProvider, StoreError, StoredEntry};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub struct Reaper {
    provider: Arc<dyn PersistenceProvider>,
    config: RetentionConfig,
}

impl Reaper {
    pub fn new(provider: Arc<dyn PersistenceProvider>, config: RetentionConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Remove dedup records that expired at or before `now`.
    ///
    /// Returns the number of expiry entries consumed. When the dedup records
    /// cannot be deleted, the consumed index entries are written back so the
    /// next sweep retries them.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let expired = self
            .provider
            .delete_range(Bucket::Expiry, &sweep_bound(now))
            .await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let fingerprints: Vec<String> = expired
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.value).into_owned())
            .collect();
        if let Err(e) = self.provider.delete(Bucket::Messages, &fingerprints).await {
            self.restore_index(&expired).await;
            return Err(e);
        }

        debug!("[sr-04] Expired {} dedup records", fingerprints.len());
        Ok(fingerprints.len())
    }

    async fn restore_index(&self, entries: &[StoredEntry]) {
        let mut orphaned = Vec::new();
        for entry in entries {
            if let Err(e) = self
                .provider
                .put(Bucket::Expiry, &entry.key, &entry.value, None)
                .await
            {
                debug!("[sr-04] Could not restore expiry entry {}: {}", entry.key, e);
                orphaned.push(String::from_utf8_lossy(&entry.value).into_owned());
            }
        }
        if !orphaned.is_empty() {
            warn!(
                "[sr-04] {} dedup records lost their expiry entry: {:?}",
                orphaned.len(),
                orphaned
            );
        }
    }

    pub async fn sweep_expired(&self) -> Result<usize, StoreError> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Purge the dedup bucket when it exceeds the size limit.
    ///
    /// Returns `true` when a purge happened.
    pub async fn size_sweep(&self) -> Result<bool, StoreError> {
        if self.config.size_limit == 0 {
            return Ok(false);
        }

        let size = self.provider.total_size(Bucket::Messages).await?;
        if size <= self.config.size_limit {
            return Ok(false);
        }

        warn!(
            "[sr-04] Dedup store at {} bytes exceeds limit of {} bytes, purging",
            size, self.config.size_limit
        );
        self.provider.purge_bucket(Bucket::Messages).await?;
        Ok(true)
    }

    /// One maintenance pass: size sweep, then expiry sweep. Errors are logged.
    pub async fn run_once(&self) {
        if let Err(e) = self.size_sweep().await {
            error!("[sr-04] Size check failed: {}", e);
        }
        if let Err(e) = self.sweep_expired().await {
            error!("[sr-04] Expiry sweep failed: {}", e);
        }
    }

    /// Run [`run_once`](Self::run_once) every `sweep_interval` until
    /// `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.sweep_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("[sr-04] Reaper started (every {:?})", period);
            loop {
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("[sr-04] Shutdown signal received");
                            break;
                        }
                    }
                    _ = ticker.tick() => self.run_once().await,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use sr_01_persistence::{BackendKind, InMemoryStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// In-memory store whose deletes from the dedup bucket can be made to fail.
    #[derive(Default)]
    struct FlakyDeletes {
        inner: InMemoryStore,
        fail_deletes: AtomicBool,
    }

    #[async_trait]
    impl PersistenceProvider for FlakyDeletes {
        fn backend(&self) -> BackendKind {
            self.inner.backend()
        }

        async fn put(
            &self,
            bucket: Bucket,
            key: &str,
            value: &[u8],
            expires_at: Option<DateTime<Utc>>,
        ) -> Result<(), StoreError> {
            self.inner.put(bucket, key, value, expires_at).await
        }

        async fn put_if_absent(
            &self,
            bucket: Bucket,
            key: &str,
            value: &[u8],
            expires_at: Option<DateTime<Utc>>,
        ) -> Result<bool, StoreError> {
            self.inner.put_if_absent(bucket, key, value, expires_at).await
        }

        async fn get_if_present(
            &self,
            bucket: Bucket,
            key: &str,
        ) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get_if_present(bucket, key).await
        }

        async fn delete(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError> {
            if bucket == Bucket::Messages && self.fail_deletes.load(Ordering::SeqCst) {
                return Err(StoreError::io("delete rejected"));
            }
            self.inner.delete(bucket, keys).await
        }

        async fn delete_range(
            &self,
            bucket: Bucket,
            upper_bound: &str,
        ) -> Result<Vec<StoredEntry>, StoreError> {
            self.inner.delete_range(bucket, upper_bound).await
        }

        async fn total_size(&self, bucket: Bucket) -> Result<u64, StoreError> {
            self.inner.total_size(bucket).await
        }

        async fn purge_bucket(&self, bucket: Bucket) -> Result<(), StoreError> {
            self.inner.purge_bucket(bucket).await
        }

        async fn close(&self) -> Result<(), StoreError> {
            self.inner.close().await
        }
    }

    fn make_reaper(size_limit: u64) -> (Arc<InMemoryStore>, Reaper) {
        let provider = Arc::new(InMemoryStore::new());
        let reaper = Reaper::new(provider.clone(), RetentionConfig::for_testing(size_limit));
        (provider, reaper)
    }

    #[tokio::test]
    async fn test_record_survives_until_expiry() {
        let (provider, reaper) = make_reaper(0);
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        provider.put(Bucket::Messages, "fp", b"v", Some(t)).await.unwrap();

        assert_eq!(reaper.sweep_expired_at(t - ChronoDuration::seconds(1)).await.unwrap(), 0);
        assert!(provider.get_if_present(Bucket::Messages, "fp").await.unwrap().is_some());

        assert_eq!(reaper.sweep_expired_at(t).await.unwrap(), 1);
        assert!(provider.get_if_present(Bucket::Messages, "fp").await.unwrap().is_none());
        assert!(provider.is_empty(Bucket::Expiry));
    }

    #[tokio::test]
    async fn test_records_without_expiry_are_kept() {
        let (provider, reaper) = make_reaper(0);
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        provider.put(Bucket::Messages, "forever", b"v", None).await.unwrap();
        provider.put(Bucket::Messages, "brief", b"v", Some(t)).await.unwrap();

        reaper.sweep_expired_at(t + ChronoDuration::days(365)).await.unwrap();

        assert_eq!(provider.keys(Bucket::Messages), vec!["forever".to_string()]);
    }

    #[tokio::test]
    async fn test_expiry_sweep_is_idempotent() {
        let (provider, reaper) = make_reaper(0);
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        provider.put(Bucket::Messages, "a", b"v", Some(t)).await.unwrap();
        provider.put(Bucket::Messages, "b", b"v", Some(t)).await.unwrap();

        assert_eq!(reaper.sweep_expired_at(t).await.unwrap(), 2);
        assert_eq!(reaper.sweep_expired_at(t).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_expiry_index() {
        let provider = Arc::new(FlakyDeletes::default());
        let reaper = Reaper::new(provider.clone(), RetentionConfig::for_testing(0));
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        provider.put(Bucket::Messages, "fp", b"v", Some(t)).await.unwrap();

        provider.fail_deletes.store(true, Ordering::SeqCst);
        assert!(reaper.sweep_expired_at(t).await.is_err());
        assert_eq!(provider.inner.len(Bucket::Expiry), 1);
        assert!(provider.get_if_present(Bucket::Messages, "fp").await.unwrap().is_some());

        provider.fail_deletes.store(false, Ordering::SeqCst);
        assert_eq!(reaper.sweep_expired_at(t).await.unwrap(), 1);
        assert!(provider.get_if_present(Bucket::Messages, "fp").await.unwrap().is_none());
        assert!(provider.inner.is_empty(Bucket::Expiry));
    }

    #[tokio::test]
    async fn test_size_sweep_purges_over_limit() {
        let (provider, reaper) = make_reaper(100);
        provider.put(Bucket::Messages, "k1", &[1u8; 60], None).await.unwrap();
        assert!(!reaper.size_sweep().await.unwrap());
        assert_eq!(provider.len(Bucket::Messages), 1);

        provider.put(Bucket::Messages, "k2", &[1u8; 60], None).await.unwrap();
        provider.put(Bucket::Counters, "slack", b"7", None).await.unwrap();
        assert!(reaper.size_sweep().await.unwrap());
        assert!(provider.is_empty(Bucket::Messages));
        assert_eq!(provider.len(Bucket::Counters), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_never_purges() {
        let (provider, reaper) = make_reaper(0);
        provider.put(Bucket::Messages, "k", &[1u8; 4096], None).await.unwrap();
        assert!(!reaper.size_sweep().await.unwrap());
        assert_eq!(provider.len(Bucket::Messages), 1);
    }

    #[tokio::test]
    async fn test_run_once_swallows_errors() {
        let (provider, reaper) = make_reaper(10);
        provider.set_unavailable(true);
        reaper.run_once().await;
        assert!(reaper.size_sweep().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_sweeps_and_stops() {
        let (provider, reaper) = make_reaper(0);
        let past = Utc::now() - ChronoDuration::minutes(1);
        provider.put(Bucket::Messages, "old", b"v", Some(past)).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Arc::new(reaper).spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(provider.is_empty(Bucket::Messages));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
