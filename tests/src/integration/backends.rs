//! # Provider Contract Across Backends
//!
//! The in-memory double, RocksDB and the relational store must agree on
//! every observable behavior the core relies on.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{open_store, ALL_BACKENDS};
    use chrono::{Duration, TimeZone, Utc};
    use shared_types::RenderedScan;
    use sr_01_persistence::{
        expiry_key, sweep_bound, BookkeepingApi, BookkeepingService, Bucket,
    };
    use sr_02_dedup::DeduplicationStore;
    use sr_03_aggregation::{aggregation_key, AggregationEngine};
    use std::sync::Arc;

    fn entry(n: usize) -> RenderedScan {
        RenderedScan::from([("n".to_string(), n.to_string())])
    }

    #[tokio::test]
    async fn test_dedup_is_idempotent_everywhere() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let dedup = DeduplicationStore::new(Arc::clone(&store.provider));

            assert!(dedup.may_be_store("fp", b"v1", None).await.unwrap(), "{backend:?}");
            assert!(!dedup.may_be_store("fp", b"v2", None).await.unwrap(), "{backend:?}");
            assert_eq!(
                store.provider.get_if_present(Bucket::Messages, "fp").await.unwrap(),
                Some(b"v1".to_vec()),
                "{backend:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_sightings_admit_one() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let dedup = DeduplicationStore::new(Arc::clone(&store.provider));

            let mut handles = Vec::new();
            for i in 0..8 {
                let dedup = dedup.clone();
                handles.push(tokio::spawn(async move {
                    dedup
                        .may_be_store("race", format!("v{i}").as_bytes(), None)
                        .await
                        .unwrap()
                }));
            }
            let mut admitted = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    admitted += 1;
                }
            }
            assert_eq!(admitted, 1, "{backend:?}");
        }
    }

    #[tokio::test]
    async fn test_expiry_index_is_ordered_and_inclusive() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

            // Inserted out of order, two sharing a timestamp.
            for (offset, fp) in [(20, "c"), (0, "a"), (10, "b"), (10, "b2"), (30, "d")] {
                store
                    .provider
                    .put(
                        Bucket::Messages,
                        fp,
                        b"v",
                        Some(base + Duration::seconds(offset)),
                    )
                    .await
                    .unwrap();
            }

            let expired = store
                .provider
                .delete_range(Bucket::Expiry, &sweep_bound(base + Duration::seconds(20)))
                .await
                .unwrap();
            let fps: Vec<_> = expired
                .iter()
                .map(|e| String::from_utf8(e.value.clone()).unwrap())
                .collect();
            assert_eq!(fps, vec!["a", "b", "b2", "c"], "{backend:?}");
            assert_eq!(
                expired[0].key,
                expiry_key(base, "a"),
                "{backend:?}"
            );

            let rest = store
                .provider
                .delete_range(Bucket::Expiry, &sweep_bound(base + Duration::days(1)))
                .await
                .unwrap();
            assert_eq!(rest.len(), 1, "{backend:?}");
        }
    }

    #[tokio::test]
    async fn test_size_and_purge() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            assert_eq!(store.provider.total_size(Bucket::Messages).await.unwrap(), 0);

            store
                .provider
                .put(Bucket::Messages, "k1", &[7u8; 100], None)
                .await
                .unwrap();
            store
                .provider
                .put(Bucket::Aggregation, "k2", &[7u8; 500], None)
                .await
                .unwrap();

            let size = store.provider.total_size(Bucket::Messages).await.unwrap();
            assert!((100..200).contains(&size), "{backend:?}: {size}");

            store.provider.purge_bucket(Bucket::Messages).await.unwrap();
            assert_eq!(
                store.provider.total_size(Bucket::Messages).await.unwrap(),
                0,
                "{backend:?}"
            );
            assert!(store
                .provider
                .get_if_present(Bucket::Aggregation, "k2")
                .await
                .unwrap()
                .is_some());
        }
    }

    #[tokio::test]
    async fn test_count_aggregation_on_every_backend() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let engine = AggregationEngine::new(Arc::clone(&store.provider));
            let key = aggregation_key("route1", "slack");

            assert!(engine.aggregate(&key, Some(entry(1)), 3, false).await.unwrap().is_none());
            assert_eq!(engine.pending(&key).await.unwrap().len(), 1, "{backend:?}");
            assert!(engine.aggregate(&key, Some(entry(2)), 3, false).await.unwrap().is_none());
            assert_eq!(engine.pending(&key).await.unwrap().len(), 2, "{backend:?}");

            let batch = engine
                .aggregate(&key, Some(entry(3)), 3, false)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(batch, vec![entry(3), entry(2), entry(1)], "{backend:?}");
            assert!(engine.pending(&key).await.unwrap().is_empty(), "{backend:?}");
        }
    }

    #[tokio::test]
    async fn test_bookkeeping_on_every_backend() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let bookkeeping = BookkeepingService::new(Arc::clone(&store.provider));

            assert_eq!(bookkeeping.invocation_count("slack").await.unwrap(), 0);
            bookkeeping.register_invocation("slack").await.unwrap();
            assert_eq!(bookkeeping.register_invocation("slack").await.unwrap(), 2);

            let first = bookkeeping.ensure_api_key().await.unwrap();
            let second = bookkeeping.ensure_api_key().await.unwrap();
            assert_ne!(first, second, "{backend:?}");
            assert_eq!(bookkeeping.api_key().await.unwrap(), second);

            assert_eq!(bookkeeping.load_config_snapshot().await.unwrap(), "{}");
            bookkeeping
                .save_config_snapshot(r#"{"name":"acme"}"#)
                .await
                .unwrap();
            assert_eq!(
                bookkeeping.load_config_snapshot().await.unwrap(),
                r#"{"name":"acme"}"#
            );
        }
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            store.provider.close().await.unwrap();
            assert!(
                store
                    .provider
                    .get_if_present(Bucket::Messages, "k")
                    .await
                    .is_err(),
                "{backend:?}"
            );
        }
    }
}
