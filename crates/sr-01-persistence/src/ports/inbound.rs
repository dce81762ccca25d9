//! # Inbound Ports
//!
//! Operational bookkeeping kept in the same store as relay data.

use async_trait::async_trait;

use crate::domain::StoreError;

/// Per-output counters, the API key and the settings snapshot.
#[async_trait]
pub trait BookkeepingApi: Send + Sync {
    /// Increment the persisted invocation counter for `output`.
    async fn register_invocation(&self, output: &str) -> Result<u64, StoreError>;

    /// Current counter value; zero when the output never sent anything.
    async fn invocation_count(&self, output: &str) -> Result<u64, StoreError>;

    /// Generate and store a fresh API key, replacing any previous one.
    async fn ensure_api_key(&self) -> Result<String, StoreError>;

    /// The stored API key. Fails with `NotFound` when none was generated.
    async fn api_key(&self) -> Result<String, StoreError>;

    async fn save_config_snapshot(&self, json: &str) -> Result<(), StoreError>;

    /// The last saved snapshot, or `"{}"` when none exists.
    async fn load_config_snapshot(&self) -> Result<String, StoreError>;
}
