//! Queue and drain behavior against a scripted transport.

use outbox_store::{LocalStore, ResourceKind, StoreConfig, StoreError};
use outbox_sync::{
    ActionType, Connectivity, DrainReport, MockTransport, NewAction, QueueStats, ReplayResponse,
    RetryConfig, SyncConfig, SyncEngine, SyncError, SyncEvent,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type Engine = SyncEngine<Arc<MockTransport>>;

fn engine_with(connectivity: Connectivity, config: SyncConfig) -> (Arc<Engine>, Arc<MockTransport>) {
    let store = Arc::new(LocalStore::open(StoreConfig::in_memory()).unwrap());
    let transport = Arc::new(MockTransport::new());
    let engine = SyncEngine::new(config, Arc::clone(&transport), store, connectivity);
    (Arc::new(engine), transport)
}

fn engine(connectivity: Connectivity) -> (Arc<Engine>, Arc<MockTransport>) {
    engine_with(connectivity, SyncConfig::new().with_item_delay(Duration::ZERO))
}

fn property(title: &str) -> NewAction {
    NewAction::create(
        ResourceKind::Property,
        "/api/properties",
        json!({ "title": title }),
    )
}

fn action_strategy() -> impl Strategy<Value = NewAction> {
    (
        prop::sample::select(vec![ActionType::Create, ActionType::Update, ActionType::Delete]),
        prop::sample::select(ResourceKind::ALL.to_vec()),
        any::<u32>(),
    )
        .prop_map(|(action_type, resource, n)| {
            NewAction::new(
                action_type,
                resource,
                format!("/api/{resource}/{n}"),
                json!({ "id": n }),
            )
        })
}

proptest! {
    #[test]
    fn offline_enqueues_are_listed_in_order(actions in prop::collection::vec(action_strategy(), 0..40)) {
        let (engine, _) = engine(Connectivity::offline());
        let queue = engine.queue();

        let ids: Vec<String> = actions
            .iter()
            .map(|action| queue.enqueue(action.clone()).unwrap())
            .collect();

        let items = queue.get_queue();
        prop_assert_eq!(items.len(), actions.len());
        for ((item, id), action) in items.iter().zip(&ids).zip(&actions) {
            prop_assert_eq!(&item.id, id);
            prop_assert_eq!(item.retry_count, 0);
            prop_assert_eq!(item.action_type, action.action_type);
            prop_assert_eq!(item.resource, action.resource);
            prop_assert_eq!(&item.payload, &action.payload);
        }
    }
}

#[tokio::test]
async fn empty_drain_is_a_no_op() {
    let (engine, transport) = engine(Connectivity::online());

    for _ in 0..3 {
        let report = engine.drain().await.unwrap();
        assert_eq!(report, DrainReport::default());
    }
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_drains_are_single_flight() {
    let (engine, transport) = engine(Connectivity::online());
    transport.set_delay(Duration::from_secs(2));
    engine.queue().enqueue(property("A")).unwrap();
    engine.queue().enqueue(property("B")).unwrap();

    let (first, second) = tokio::join!(engine.drain(), engine.drain());
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.success, 2);
    assert_eq!(second, DrainReport::default());
    assert_eq!(transport.request_count(), 2);
    assert_eq!(engine.stats().drains_skipped, 1);
    assert!(engine.queue().is_empty());
}

#[tokio::test]
async fn delivery_follows_queue_order() {
    let (engine, transport) = engine(Connectivity::online());
    for title in ["first", "second", "third"] {
        engine.queue().enqueue(property(title)).unwrap();
    }

    engine.drain().await.unwrap();

    let titles: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.body.as_ref().unwrap()["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["first", "second", "third"]);
    assert!(transport
        .requests()
        .iter()
        .all(|r| r.header("X-Offline-Replay") == Some("true")));
}

#[tokio::test]
async fn failures_consume_retries_then_park() {
    let (engine, transport) = engine(Connectivity::online());
    let id = engine.queue().enqueue(property("Casa")).unwrap();

    for attempt in 1..=3u32 {
        transport.push_response(ReplayResponse::status(500));
        let report = engine.drain().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].id, id);

        let item = engine.queue().get(&id).unwrap();
        assert_eq!(item.retry_count, attempt);
    }

    // Parked: still queued, never sent again.
    let report = engine.drain().await.unwrap();
    assert_eq!(report.success, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(transport.request_count(), 3);
    assert!(engine.queue().get(&id).is_some());
    assert_eq!(
        engine.queue().get_stats(),
        QueueStats {
            total: 1,
            pending: 0,
            retrying: 0,
            failed: 1,
        }
    );
}

#[tokio::test]
async fn failures_do_not_block_later_items() {
    let (engine, transport) = engine(Connectivity::online());
    let first = engine.queue().enqueue(property("A")).unwrap();
    engine.queue().enqueue(property("B")).unwrap();
    transport.push_error(SyncError::transport_retryable("connection reset"));

    let report = engine.drain().await.unwrap();
    assert_eq!(report.success, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].id, first);
    assert!(report.errors[0].error.contains("connection reset"));

    let remaining = engine.queue().get_queue();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, first);
    assert_eq!(remaining[0].retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn drain_works_from_a_snapshot() {
    let (engine, transport) = engine(Connectivity::online());
    transport.set_delay(Duration::from_secs(5));
    let a = engine.queue().enqueue(property("A")).unwrap();

    let drain = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.drain().await }
    });
    while transport.request_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(engine.is_draining());
    let b = engine.queue().enqueue(property("B")).unwrap();

    let report = drain.await.unwrap().unwrap();
    assert_eq!(report.success, 1);
    assert!(engine.queue().get(&a).is_none());
    assert!(engine.queue().get(&b).is_some());
    assert_eq!(transport.request_count(), 1);

    let report = engine.drain().await.unwrap();
    assert_eq!(report.success, 1);
    assert!(engine.queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn items_removed_mid_drain_are_skipped() {
    let (engine, transport) = engine(Connectivity::online());
    transport.set_delay(Duration::from_secs(1));
    engine.queue().enqueue(property("A")).unwrap();
    let b = engine.queue().enqueue(property("B")).unwrap();

    let drain = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.drain().await }
    });
    while transport.request_count() == 0 {
        tokio::task::yield_now().await;
    }
    engine.queue().remove_action(&b).unwrap();

    let report = drain.await.unwrap().unwrap();
    assert_eq!(report, DrainReport { success: 1, failed: 0, errors: vec![] });
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn items_are_spaced_by_the_configured_delay() {
    let (engine, _) = engine_with(
        Connectivity::online(),
        SyncConfig::new().with_item_delay(Duration::from_millis(250)),
    );
    for title in ["A", "B", "C"] {
        engine.queue().enqueue(property(title)).unwrap();
    }

    let start = tokio::time::Instant::now();
    engine.drain().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(750));
}

#[tokio::test]
async fn purge_removes_only_parked_items() {
    let (engine, transport) = engine_with(
        Connectivity::online(),
        SyncConfig::new()
            .with_item_delay(Duration::ZERO)
            .with_retry(RetryConfig::new(1)),
    );
    let doomed = engine.queue().enqueue(property("doomed")).unwrap();
    transport.push_response(ReplayResponse::status(503));
    engine.drain().await.unwrap();

    engine.connectivity().set_online(false);
    let kept = engine.queue().enqueue(property("kept")).unwrap();

    assert_eq!(engine.queue().clear_failed_actions().unwrap(), 1);
    let ids: Vec<String> = engine.queue().get_queue().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![kept]);
    assert!(engine.queue().get(&doomed).is_none());
}

#[tokio::test]
async fn drain_publishes_lifecycle_events() {
    let (engine, transport) = engine(Connectivity::online());
    let ok = engine.queue().enqueue(property("A")).unwrap();
    let bad = engine.queue().enqueue(property("B")).unwrap();
    transport.push_response(ReplayResponse::ok(Some(json!({"id": "p1"}))));
    transport.push_response(ReplayResponse::status(500));

    let mut events = engine.events().subscribe();
    let report = engine.drain().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0], SyncEvent::SyncStarted { queued: 2 });
    assert_eq!(seen[1], SyncEvent::ActionSynced { id: ok });
    assert!(matches!(
        &seen[2],
        SyncEvent::ActionFailed { id, retry_count: 1, .. } if *id == bad
    ));
    assert_eq!(seen[3], SyncEvent::SyncCompleted { report });
}

#[tokio::test]
async fn closed_store_drains_nothing() {
    let (engine, _) = engine(Connectivity::online());
    engine.queue().enqueue(property("A")).unwrap();
    let mut events = engine.events().subscribe();

    // Queue reads degrade to empty once the store is closed.
    engine.queue().store().close();
    let report = engine.drain().await.unwrap();
    assert!(report.is_empty());
    assert_eq!(events.try_recv().unwrap(), SyncEvent::SyncStarted { queued: 0 });
}

#[tokio::test]
async fn queue_stats_follow_the_engine_retry_limit() {
    let (engine, transport) = engine_with(
        Connectivity::online(),
        SyncConfig::new()
            .with_item_delay(Duration::ZERO)
            .with_retry(RetryConfig::new(5)),
    );
    assert_eq!(engine.queue().max_retries(), 5);
    let id = engine.queue().enqueue(property("Casa")).unwrap();

    for _ in 0..6 {
        transport.push_response(ReplayResponse::status(500));
        engine.drain().await.unwrap();
    }

    assert_eq!(transport.request_count(), 5);
    assert_eq!(engine.queue().get(&id).unwrap().retry_count, 5);
    assert_eq!(engine.queue().get_stats().failed, 1);
    assert_eq!(engine.queue().clear_failed_actions().unwrap(), 1);
    assert!(engine.queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn store_failure_mid_drain_releases_the_engine() {
    let (engine, transport) = engine(Connectivity::online());
    transport.set_delay(Duration::from_secs(1));
    engine.queue().enqueue(property("A")).unwrap();
    let mut events = engine.events().subscribe();

    let drain = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.drain().await }
    });
    while transport.request_count() == 0 {
        tokio::task::yield_now().await;
    }
    // Acknowledging the delivery needs a write, which now fails.
    engine.queue().store().close();

    let err = drain.await.unwrap().unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::NotInitialized)));
    assert!(!engine.is_draining());
    assert_eq!(events.try_recv().unwrap(), SyncEvent::SyncStarted { queued: 1 });
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::SyncFailed {
            error: err.to_string(),
        }
    );
    assert!(engine.stats().last_error.is_some());

    engine.queue().store().init().unwrap();
    let id = engine.queue().enqueue(property("B")).unwrap();
    let report = engine.drain().await.unwrap();
    assert_eq!(report.success, 1);
    assert!(engine.queue().get(&id).is_none());
    assert_eq!(engine.stats().drains_skipped, 0);
}
