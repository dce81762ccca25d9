//! Per-key async locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async mutex per key.
///
/// The outer map lock is only held while looking up the entry, never while
/// the caller awaits the per-key lock.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of keys that ever took a lock.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let _held = locks.lock("a").await;

        assert!(timeout(Duration::from_millis(20), locks.lock("a")).await.is_err());
    }

    #[tokio::test]
    async fn test_different_keys_are_independent() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;

        assert!(timeout(Duration::from_millis(20), locks.lock("b")).await.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_lock_can_be_retaken() {
        let locks = KeyedLocks::new();
        drop(locks.lock("a").await);
        let _again = locks.lock("a").await;
        assert_eq!(locks.len(), 1);
    }
}
