//! # Deduplication Store

use chrono::{DateTime, Duration, Utc};
use sr_01_persistence::{Bucket, PersistenceProvider, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Expiry for a dedup record; `None` when the window is zero.
pub fn expiry_for(now: DateTime<Utc>, window_seconds: u64) -> Option<DateTime<Utc>> {
    if window_seconds == 0 {
        return None;
    }
    let window = i64::try_from(window_seconds).ok()?;
    now.checked_add_signed(Duration::try_seconds(window)?)
}

/// First-sighting records in [`Bucket::Messages`].
#[derive(Clone)]
pub struct DeduplicationStore {
    provider: Arc<dyn PersistenceProvider>,
}

impl DeduplicationStore {
    pub fn new(provider: Arc<dyn PersistenceProvider>) -> Self {
        Self { provider }
    }

    /// Store `payload` under `key` unless a record already exists.
    ///
    /// Returns `true` on first sighting and `false` for a duplicate. An
    /// insert that loses a race against a concurrent writer counts as a
    /// duplicate. An existing record with an empty payload is treated as
    /// absent and overwritten.
    pub async fn may_be_store(
        &self,
        key: &str,
        payload: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        match self.provider.get_if_present(Bucket::Messages, key).await? {
            Some(existing) if !existing.is_empty() => {
                debug!("[sr-02] Duplicate message {}", key);
                Ok(false)
            }
            Some(_) => {
                self.provider
                    .put(Bucket::Messages, key, payload, expires_at)
                    .await?;
                Ok(true)
            }
            None => {
                let stored = self
                    .provider
                    .put_if_absent(Bucket::Messages, key, payload, expires_at)
                    .await?;
                if !stored {
                    debug!("[sr-02] Lost insert race for {}", key);
                }
                Ok(stored)
            }
        }
    }
}
