use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::test_utils::{enable_logger, memory_factory, CountingLifecycle};
use crate::{MemoryCluster, ResourceHolder, WatchEvent};

#[tokio::test]
async fn test_concurrent_first_access_builds_once() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle =
        Arc::new(CountingLifecycle::new("/app").with_init_delay(Duration::from_millis(50)));
    let (holder, _loop_handle) =
        ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
            .await
            .expect("spawn holder");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let holder = holder.clone();
        tasks.push(tokio::spawn(async move {
            *holder.get().await.expect("get should succeed")
        }));
    }
    for task in tasks {
        assert_eq!(task.await.expect("task"), 1);
    }
    assert_eq!(lifecycle.init_calls.load(Ordering::SeqCst), 1);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_relevant_change_publishes_replacement() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle = Arc::new(CountingLifecycle::new("/app"));
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    assert_eq!(*holder.get().await.expect("first build"), 1);

    holder
        .event_sender()
        .send(WatchEvent::NodeDataChanged {
            path: "/app/k".to_string(),
        })
        .await
        .expect("inject event");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(*holder.get().await.expect("rebuilt"), 101);
    assert_eq!(holder.stats().rebuilds(), 1);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_rebuild_without_replacement_keeps_resource() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle = Arc::new(CountingLifecycle::new("/app").without_replacement());
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    let before = holder.get().await.expect("first build");
    holder
        .event_sender()
        .send(WatchEvent::NodeDataChanged {
            path: "/app/k".to_string(),
        })
        .await
        .expect("inject event");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(lifecycle.rebuild_calls.load(Ordering::SeqCst), 1);
    let after = holder.get().await.expect("still served");
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(lifecycle.destroy_calls.load(Ordering::SeqCst), 0);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_irrelevant_change_is_filtered() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle = Arc::new(CountingLifecycle::new("/app"));
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    holder.get().await.expect("first build");
    holder
        .event_sender()
        .send(WatchEvent::NodeDataChanged {
            path: "/elsewhere/k".to_string(),
        })
        .await
        .expect("inject event");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(lifecycle.rebuild_calls.load(Ordering::SeqCst), 0);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_created_event_is_informational() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle = Arc::new(CountingLifecycle::new("/app"));
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    holder
        .event_sender()
        .send(WatchEvent::NodeCreated {
            path: "/app/k".to_string(),
        })
        .await
        .expect("inject event");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(lifecycle.rebuild_calls.load(Ordering::SeqCst), 0);
    assert_eq!(holder.stats().unexpected_events(), 0);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_unexpected_event_is_counted() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle = Arc::new(CountingLifecycle::new("/app"));
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    holder
        .event_sender()
        .send(WatchEvent::NodeDeleted {
            path: "/app/k".to_string(),
        })
        .await
        .expect("inject event");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(holder.stats().unexpected_events(), 1);
    assert_eq!(lifecycle.rebuild_calls.load(Ordering::SeqCst), 0);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_drain_delay_defers_destroy_without_stalling_events() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle =
        Arc::new(CountingLifecycle::new("/app").with_drain(Duration::from_millis(150)));
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    let first = holder.get().await.expect("first build");
    assert_eq!(*first, 1);

    holder
        .event_sender()
        .send(WatchEvent::NodeDataChanged {
            path: "/app/k".to_string(),
        })
        .await
        .expect("inject event");
    sleep(Duration::from_millis(50)).await;

    // replacement published, old value still alive inside the drain window
    assert_eq!(*holder.get().await.expect("rebuilt"), 101);
    assert_eq!(lifecycle.destroy_calls.load(Ordering::SeqCst), 0);
    assert_eq!(*first, 1);

    // a second event is processed while the first destroy is still pending
    holder
        .event_sender()
        .send(WatchEvent::NodeDataChanged {
            path: "/app/k".to_string(),
        })
        .await
        .expect("inject event");
    sleep(Duration::from_millis(50)).await;
    assert_eq!(*holder.get().await.expect("rebuilt again"), 102);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(lifecycle.destroy_calls.load(Ordering::SeqCst), 2);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_session_expiry_renews_and_revalidates() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle = Arc::new(CountingLifecycle::new("/app"));
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    holder.get().await.expect("first build");
    assert_eq!(cluster.live_sessions(), 1);

    cluster.expire_all_sessions();
    sleep(Duration::from_millis(100)).await;

    // exactly one replacement session, and a rebuild from the watched root
    assert_eq!(cluster.live_sessions(), 1);
    assert_eq!(holder.stats().session_renewals(), 1);
    assert_eq!(lifecycle.rebuild_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*holder.get().await.expect("rebuilt"), 101);
    holder.shutdown().await;
}

#[tokio::test]
async fn test_failed_session_renewal_keeps_last_resource() {
    enable_logger();
    let cluster = MemoryCluster::new();
    let lifecycle = Arc::new(CountingLifecycle::new("/app"));
    let (holder, _loop_handle) = ResourceHolder::spawn(lifecycle.clone(), memory_factory(&cluster))
        .await
        .expect("spawn holder");

    let before = holder.get().await.expect("first build");
    cluster.fail_next_connects(1);
    cluster.expire_all_sessions();
    sleep(Duration::from_millis(100)).await;

    assert_eq!(holder.stats().session_renewals(), 0);
    let after = holder.get().await.expect("still served");
    assert!(Arc::ptr_eq(&before, &after));
    holder.shutdown().await;
}
