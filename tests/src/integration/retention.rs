//! # Retention
//!
//! The reaper working against state written by live dispatch.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{make_router, open_store, output, route, ALL_BACKENDS};
    use chrono::{Duration, Utc};
    use shared_types::RoutePlugins;
    use sr_01_persistence::Bucket;
    use sr_04_reaper::{Reaper, RetentionConfig};
    use std::sync::Arc;

    const SCAN: &[u8] = br#"{"image":"nginx","severity":"critical"}"#;

    #[tokio::test]
    async fn test_dedup_window_reopens_after_sweep() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let (factory, router) = make_router(store.provider.clone());
            router.add_output(output("slack")).await.unwrap();
            router
                .add_route(route(
                    "route1",
                    &["slack"],
                    RoutePlugins {
                        unique_message_timeout: "1m".to_string(),
                        ..Default::default()
                    },
                ))
                .await
                .unwrap();
            let reaper = Reaper::new(Arc::clone(&store.provider), RetentionConfig::default());

            router.handle(SCAN).await.unwrap();
            router.handle(SCAN).await.unwrap();
            let slack = factory.output("slack").unwrap();
            assert_eq!(slack.sent_count(), 1, "{backend:?}");

            // Still inside the window.
            assert_eq!(reaper.sweep_expired_at(Utc::now()).await.unwrap(), 0);
            router.handle(SCAN).await.unwrap();
            assert_eq!(slack.sent_count(), 1, "{backend:?}");

            let later = Utc::now() + Duration::seconds(61);
            assert_eq!(reaper.sweep_expired_at(later).await.unwrap(), 1, "{backend:?}");
            router.handle(SCAN).await.unwrap();
            assert_eq!(slack.sent_count(), 2, "{backend:?}");
        }
    }

    #[tokio::test]
    async fn test_records_without_window_outlive_sweeps() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let (factory, router) = make_router(store.provider.clone());
            router.add_output(output("slack")).await.unwrap();
            router
                .add_route(route("route1", &["slack"], RoutePlugins::default()))
                .await
                .unwrap();
            let reaper = Reaper::new(Arc::clone(&store.provider), RetentionConfig::default());

            router.handle(SCAN).await.unwrap();
            reaper
                .sweep_expired_at(Utc::now() + Duration::days(3_650))
                .await
                .unwrap();
            router.handle(SCAN).await.unwrap();

            assert_eq!(factory.output("slack").unwrap().sent_count(), 1, "{backend:?}");
        }
    }

    #[tokio::test]
    async fn test_size_backstop_purges_dedup_records() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let (factory, router) = make_router(store.provider.clone());
            router.add_output(output("slack")).await.unwrap();
            router
                .add_route(route("route1", &["slack"], RoutePlugins::default()))
                .await
                .unwrap();

            router.handle(SCAN).await.unwrap();
            let size = store.provider.total_size(Bucket::Messages).await.unwrap();
            assert!(size > 0, "{backend:?}");

            let roomy = Reaper::new(
                Arc::clone(&store.provider),
                RetentionConfig::for_testing(size * 10),
            );
            assert!(!roomy.size_sweep().await.unwrap(), "{backend:?}");
            router.handle(SCAN).await.unwrap();
            assert_eq!(factory.output("slack").unwrap().sent_count(), 1, "{backend:?}");

            let tight = Reaper::new(
                Arc::clone(&store.provider),
                RetentionConfig::for_testing(size - 1),
            );
            assert!(tight.size_sweep().await.unwrap(), "{backend:?}");
            assert_eq!(store.provider.total_size(Bucket::Messages).await.unwrap(), 0);

            // Forgotten, so delivered again.
            router.handle(SCAN).await.unwrap();
            assert_eq!(factory.output("slack").unwrap().sent_count(), 2, "{backend:?}");

            // Counters live in their own bucket and survive the purge.
            assert!(store
                .provider
                .get_if_present(Bucket::Counters, "slack")
                .await
                .unwrap()
                .is_some());
        }
    }
}
