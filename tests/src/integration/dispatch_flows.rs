//! # Dispatch Flows
//!
//! Router → dedup → aggregation → outputs, end to end.
//!
//! ## Flows Tested
//!
//! 1. Count aggregation flushes exactly one batch per `capacity` messages
//! 2. Time aggregation flushes once per interval, whatever the count
//! 3. Purely time-based routes never flush by count
//! 4. A failing output never blocks delivery to its siblings
//! 5. Fingerprints ignore property order and unrelated fields

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{make_router, open_store, output, route, Backend, ALL_BACKENDS};
    use serde_json::json;
    use shared_types::RoutePlugins;
    use std::time::Duration;

    fn scan(n: usize) -> Vec<u8> {
        format!(r#"{{"image":"img-{n}","severity":"high"}}"#).into_bytes()
    }

    #[tokio::test]
    async fn test_count_aggregation_end_to_end() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let (factory, router) = make_router(store.provider.clone());
            router.add_output(output("slack")).await.unwrap();
            router
                .add_route(route(
                    "route1",
                    &["slack"],
                    RoutePlugins {
                        aggregate_message_number: 3,
                        ..Default::default()
                    },
                ))
                .await
                .unwrap();

            for n in 0..7 {
                router.handle(&scan(n)).await.unwrap();
            }

            let sent = factory.output("slack").unwrap().sent();
            assert_eq!(sent.len(), 2, "{backend:?}");
            assert!(sent.iter().all(|batch| batch["count"] == "3"), "{backend:?}");
            router.terminate().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_aggregation_flushes_once() {
        let store = open_store(Backend::Memory).await;
        let (factory, router) = make_router(store.provider.clone());
        router.add_output(output("slack")).await.unwrap();
        router
            .add_route(route(
                "route1",
                &["slack"],
                RoutePlugins {
                    aggregate_message_number: 1000,
                    aggregate_timeout_seconds: 3,
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        for n in 0..3 {
            router.handle(&scan(n)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let slack = factory.output("slack").unwrap();
        assert_eq!(slack.sent_count(), 0);

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let sent = slack.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["count"], "3");

        router.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignore_quantity_waits_for_tick() {
        let store = open_store(Backend::Memory).await;
        let (factory, router) = make_router(store.provider.clone());
        router.add_output(output("slack")).await.unwrap();
        router
            .add_route(route(
                "route1",
                &["slack"],
                RoutePlugins {
                    aggregate_timeout_seconds: 5,
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        for n in 0..25 {
            router.handle(&scan(n)).await.unwrap();
        }
        let slack = factory.output("slack").unwrap();
        assert_eq!(slack.sent_count(), 0);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let sent = slack.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["count"], "25");

        router.terminate().await;
    }

    #[tokio::test]
    async fn test_failing_output_is_isolated() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let (factory, router) = make_router(store.provider.clone());
            let mut jira = output("jira");
            jira.options.insert("fail".to_string(), json!(true));
            router.add_output(jira).await.unwrap();
            router.add_output(output("slack")).await.unwrap();
            router
                .add_route(route("route1", &["jira", "slack"], RoutePlugins::default()))
                .await
                .unwrap();

            router.handle(&scan(1)).await.unwrap();
            router.handle(&scan(2)).await.unwrap();

            assert_eq!(factory.output("slack").unwrap().sent_count(), 2, "{backend:?}");
            assert_eq!(factory.output("jira").unwrap().sent_count(), 0, "{backend:?}");

            let failed = router.send_with_retry(&scan(3), "route1").await.unwrap();
            assert_eq!(failed, vec!["jira".to_string()], "{backend:?}");
        }
    }

    #[tokio::test]
    async fn test_each_output_sees_a_message_once() {
        for backend in ALL_BACKENDS {
            let store = open_store(backend).await;
            let (factory, router) = make_router(store.provider.clone());
            router.add_output(output("slack")).await.unwrap();
            router.add_output(output("jira")).await.unwrap();
            router
                .add_route(route("route1", &["slack", "jira"], RoutePlugins::default()))
                .await
                .unwrap();

            for _ in 0..3 {
                router.handle(&scan(1)).await.unwrap();
            }

            assert_eq!(factory.output("slack").unwrap().sent_count(), 1, "{backend:?}");
            assert_eq!(factory.output("jira").unwrap().sent_count(), 1, "{backend:?}");
        }
    }

    #[tokio::test]
    async fn test_fingerprint_is_order_independent() {
        let store = open_store(Backend::Memory).await;
        let (_, router) = make_router(store.provider.clone());
        let plugins = |props: &[&str]| RoutePlugins {
            unique_message_props: props.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };
        router
            .add_route(route("ab", &[], plugins(&["image", "artifact.digest"])))
            .await
            .unwrap();
        router
            .add_route(route("ba", &[], plugins(&["artifact.digest", "image"])))
            .await
            .unwrap();

        let first = br#"{"image":"nginx","artifact":{"digest":"sha256:1"},"ts":1}"#;
        let second = br#"{"ts":2,"artifact":{"digest":"sha256:1"},"image":"nginx"}"#;

        let fp = router.message_fingerprint(first, "ab").unwrap();
        assert_eq!(fp, router.message_fingerprint(second, "ab").unwrap());
        assert_eq!(fp, router.message_fingerprint(first, "ba").unwrap());
        assert_ne!(
            fp,
            router
                .message_fingerprint(br#"{"image":"redis","artifact":{"digest":"sha256:1"}}"#, "ab")
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_buffered_entries_survive_restart() {
        let store = open_store(Backend::RocksDb).await;
        let plugins = RoutePlugins {
            aggregate_message_number: 3,
            ..Default::default()
        };

        {
            let (_, router) = make_router(store.provider.clone());
            router.add_output(output("slack")).await.unwrap();
            router
                .add_route(route("route1", &["slack"], plugins.clone()))
                .await
                .unwrap();
            router.handle(&scan(1)).await.unwrap();
            router.handle(&scan(2)).await.unwrap();
            router.terminate().await;
        }

        let (factory, router) = make_router(store.provider.clone());
        router.add_output(output("slack")).await.unwrap();
        router
            .add_route(route("route1", &["slack"], plugins))
            .await
            .unwrap();
        router.handle(&scan(3)).await.unwrap();

        let sent = factory.output("slack").unwrap().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["count"], "3");
    }
}
