//! # Bookkeeping Service
//!
//! Implements [`BookkeepingApi`] on top of any [`PersistenceProvider`].
//!
//! Counters are stored as decimal strings in [`Bucket::Counters`]. The
//! read-modify-write of an increment runs under one async lock so parallel
//! sends never lose an increment.


use crate::domain::{Bucket, StoreError};
use crate::ports::{BookkeepingApi, PersistenceProvider};
use async_trait::async_trait;
use rand::RngCore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Key of the API key in [`Bucket::SharedConfig`].
pub const API_KEY_NAME: &str = "RELAY_API_KEY";

/// Key of the settings snapshot in [`Bucket::SharedConfig`].
pub const CONFIG_SNAPSHOT_NAME: &str = "RELAY_SETTINGS";

const API_KEY_BYTES: usize = 32;

pub struct BookkeepingService {
    provider: Arc<dyn PersistenceProvider>,
    counter_lock: Mutex<()>,
}

impl BookkeepingService {
    pub fn new(provider: Arc<dyn PersistenceProvider>) -> Self {
        Self {
            provider,
            counter_lock: Mutex::new(()),
        }
    }

    async fn read_counter(&self, output: &str) -> Result<u64, StoreError> {
        let Some(raw) = self.provider.get_if_present(Bucket::Counters, output).await? else {
            return Ok(0);
        };
        if raw.is_empty() {
            return Ok(0);
        }
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| StoreError::Corrupt {
                bucket: Bucket::Counters.as_str(),
                key: output.to_string(),
                message: "counter is not a decimal number".to_string(),
            })
    }

    async fn read_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(raw) = self.provider.get_if_present(Bucket::SharedConfig, key).await? else {
            return Ok(None);
        };
        String::from_utf8(raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                bucket: Bucket::SharedConfig.as_str(),
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl BookkeepingApi for BookkeepingService {
    async fn register_invocation(&self, output: &str) -> Result<u64, StoreError> {
        let _guard = self.counter_lock.lock().await;
        let next = self.read_counter(output).await?.saturating_add(1);
        self.provider
            .put(Bucket::Counters, output, next.to_string().as_bytes(), None)
            .await?;
        debug!("[sr-01] Output {} invoked {} times", output, next);
        Ok(next)
    }

    async fn invocation_count(&self, output: &str) -> Result<u64, StoreError> {
        self.read_counter(output).await
    }

    async fn ensure_api_key(&self) -> Result<String, StoreError> {
        let mut bytes = [0u8; API_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = hex::encode(bytes);

        self.provider
            .put(Bucket::SharedConfig, API_KEY_NAME, key.as_bytes(), None)
            .await?;
        info!("[sr-01] API key generated");
        Ok(key)
    }

    async fn api_key(&self) -> Result<String, StoreError> {
        match self.read_string(API_KEY_NAME).await? {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(StoreError::NotFound {
                bucket: Bucket::SharedConfig.as_str(),
                key: API_KEY_NAME.to_string(),
            }),
        }
    }

    async fn save_config_snapshot(&self, json: &str) -> Result<(), StoreError> {
        self.provider
            .put(
                Bucket::SharedConfig,
                CONFIG_SNAPSHOT_NAME,
                json.as_bytes(),
                None,
            )
            .await
    }

    async fn load_config_snapshot(&self) -> Result<String, StoreError> {
        Ok(self
            .read_string(CONFIG_SNAPSHOT_NAME)
            .await?
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "{}".to_string()))
    }
}
