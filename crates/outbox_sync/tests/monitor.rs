//! Connectivity monitor driving an offline client.

use outbox_store::{ResourceKind, StoreConfig};
use outbox_sync::{
    Connectivity, MockTransport, NewAction, OfflineClient, QueueStats, ReplayResponse, SyncConfig,
    SyncEvent,
};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

fn client(connectivity: Connectivity, poll_interval: Duration) -> OfflineClient<MockTransport> {
    OfflineClient::open(
        StoreConfig::in_memory(),
        MockTransport::new(),
        SyncConfig::new()
            .with_item_delay(Duration::ZERO)
            .with_poll_interval(poll_interval),
        connectivity,
    )
    .unwrap()
}

async fn wait_for(
    events: &mut Receiver<SyncEvent>,
    within: Duration,
    matches: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(within, async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test(start_paused = true)]
async fn reconnect_drains_queued_create() {
    let client = client(Connectivity::offline(), Duration::from_secs(30));
    let action = NewAction::parse(
        "CREATE",
        "properties",
        "/api/properties",
        json!({"title": "Casa Roja"}),
    )
    .unwrap();
    client.enqueue(action).unwrap();
    assert_eq!(
        client.get_stats(),
        QueueStats {
            total: 1,
            pending: 1,
            retrying: 0,
            failed: 0,
        }
    );

    client
        .engine()
        .transport()
        .push_response(ReplayResponse::ok(Some(json!({"id": "p1", "title": "Casa Roja"}))));
    let mut events = client.subscribe();
    let monitor = client.start_monitor();

    client.connectivity().set_online(true);
    wait_for(&mut events, Duration::from_secs(5), |e| {
        matches!(e, SyncEvent::SyncCompleted { report } if report.success == 1)
    })
    .await;

    assert_eq!(
        client.get_cached_api_response(ResourceKind::Property, "p1"),
        Some(json!({"id": "p1", "title": "Casa Roja"}))
    );
    assert!(client.get_queue().is_empty());
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn nothing_is_sent_while_offline() {
    let client = client(Connectivity::offline(), Duration::from_secs(1));
    let monitor = client.start_monitor();
    client
        .enqueue(NewAction::create(ResourceKind::Payment, "/api/payments", json!({"amount": 5})))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(client.engine().transport().request_count(), 0);
    assert_eq!(client.get_stats().pending, 1);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn enqueue_while_online_triggers_drain() {
    let client = client(Connectivity::online(), Duration::from_secs(3600));
    let mut events = client.subscribe();
    let monitor = client.start_monitor();

    // The first tick fires at once and drains the empty queue.
    wait_for(&mut events, Duration::from_secs(1), |e| {
        matches!(e, SyncEvent::SyncCompleted { .. })
    })
    .await;

    let id = client
        .enqueue(NewAction::update(
            ResourceKind::SupportTicket,
            "/api/tickets/t1",
            json!({"id": "t1", "status": "closed"}),
        ))
        .unwrap();

    let synced = wait_for(&mut events, Duration::from_secs(1), |e| {
        matches!(e, SyncEvent::ActionSynced { .. })
    })
    .await;
    assert_eq!(synced, SyncEvent::ActionSynced { id });
    assert_eq!(
        client.get_cached_api_response(ResourceKind::SupportTicket, "t1"),
        Some(json!({"id": "t1", "status": "closed"}))
    );
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interval_retries_failed_items() {
    let client = client(Connectivity::online(), Duration::from_secs(30));
    client
        .enqueue(NewAction::create(ResourceKind::Contract, "/api/contracts", json!({"id": "c1"})))
        .unwrap();
    client
        .engine()
        .transport()
        .push_response(ReplayResponse::status(503));

    let mut events = client.subscribe();
    let monitor = client.start_monitor();

    wait_for(&mut events, Duration::from_secs(1), |e| {
        matches!(e, SyncEvent::ActionFailed { retry_count: 1, .. })
    })
    .await;
    wait_for(&mut events, Duration::from_secs(60), |e| {
        matches!(e, SyncEvent::ActionSynced { .. })
    })
    .await;

    assert!(client.get_queue().is_empty());
    assert_eq!(client.engine().transport().request_count(), 2);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_monitor() {
    let client = client(Connectivity::online(), Duration::from_secs(1));
    let monitor = client.start_monitor();
    assert!(!monitor.is_finished());
    drop(monitor);

    client.connectivity().set_online(false);
    tokio::time::sleep(Duration::from_secs(10)).await;
    client.connectivity().set_online(true);
    client
        .enqueue(NewAction::create(ResourceKind::Property, "/api/properties", json!({})))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(client.engine().transport().request_count(), 0);
    assert_eq!(client.engine().stats().drains_completed, 0);
}

#[tokio::test(start_paused = true)]
async fn enqueue_burst_during_drain_costs_one_follow_up() {
    let client = client(Connectivity::online(), Duration::from_secs(3600));
    let transport = client.engine().transport();
    transport.set_delay(Duration::from_secs(1));
    for _ in 0..20 {
        transport.push_response(ReplayResponse::status(500));
    }

    let mut events = client.subscribe();
    let monitor = client.start_monitor();
    wait_for(&mut events, Duration::from_secs(1), |e| {
        matches!(e, SyncEvent::SyncCompleted { .. })
    })
    .await;

    let first = client
        .enqueue(NewAction::create(ResourceKind::Property, "/api/properties", json!({"n": 0})))
        .unwrap();
    while transport.request_count() == 0 {
        tokio::task::yield_now().await;
    }
    for n in 1..=4 {
        client
            .enqueue(NewAction::create(ResourceKind::Property, "/api/properties", json!({"n": n})))
            .unwrap();
    }

    tokio::time::sleep(Duration::from_secs(60)).await;

    // Empty startup drain, the drain for the first item, then one catch-up.
    assert_eq!(client.engine().stats().drains_completed, 3);
    assert_eq!(transport.request_count(), 6);
    assert_eq!(client.queue().get(&first).unwrap().retry_count, 2);
    assert_eq!(
        client.get_stats(),
        QueueStats {
            total: 5,
            pending: 0,
            retrying: 5,
            failed: 0,
        }
    );
    monitor.shutdown().await;
}
