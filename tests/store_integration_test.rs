//! End-to-end behavior of the configuration store over the embedded backend:
//! initial load, watch-driven propagation, expiry recovery and write
//! visibility through the notification round-trip.

use std::sync::Arc;
use std::time::Duration;

use confkeeper::{ConfigStore, MemoryCluster, Settings, StoreHealth};
use tokio::time::sleep;

const PATH: &str = "/confkeeper/config";

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.init.delay_ms = 10;
    settings.retry.reload.delay_ms = 10;
    settings
}

fn seeded_cluster(pairs: &[(&str, &str)]) -> MemoryCluster {
    let cluster = MemoryCluster::new();
    cluster.ensure(PATH).expect("ensure path");
    for (key, value) in pairs {
        cluster
            .put(&format!("{PATH}/{key}"), value.to_string())
            .expect("seed value");
    }
    cluster
}

#[tokio::test]
async fn test_snapshot_follows_external_updates() {
    let cluster = seeded_cluster(&[("x", "10"), ("y", "20")]);
    let store = ConfigStore::open(Arc::new(cluster.connector()), &fast_settings())
        .await
        .expect("open");

    assert_eq!(store.get("x").as_deref(), Some("10"));
    assert_eq!(store.get("y").as_deref(), Some("20"));

    // an external writer updates one key; the data watch triggers a reload
    cluster
        .put(&format!("{PATH}/y"), "30".to_string())
        .expect("external update");
    sleep(Duration::from_millis(100)).await;

    assert_eq!(store.get("y").as_deref(), Some("30"));
    assert_eq!(store.get("x").as_deref(), Some("10"));
    assert!(store.stats().rebuilds() >= 1);
    store.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_follows_key_set_changes() {
    let cluster = seeded_cluster(&[("x", "10")]);
    let store = ConfigStore::open(Arc::new(cluster.connector()), &fast_settings())
        .await
        .expect("open");
    assert_eq!(store.all().len(), 1);

    cluster
        .put(&format!("{PATH}/z"), "99".to_string())
        .expect("new key");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.get("z").as_deref(), Some("99"));
    assert_eq!(store.all().len(), 2);

    cluster.delete(&format!("{PATH}/x"));
    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.get("x"), None);
    assert_eq!(store.all().len(), 1);
    store.shutdown().await;
}

#[tokio::test]
async fn test_expiry_recovery_keeps_following_changes() {
    let cluster = seeded_cluster(&[("x", "10")]);
    let store = ConfigStore::open(Arc::new(cluster.connector()), &fast_settings())
        .await
        .expect("open");

    cluster.expire_all_sessions();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.health(), StoreHealth::Ready);
    assert_eq!(store.stats().session_renewals(), 1);
    assert_eq!(cluster.live_sessions(), 1);

    // the replacement session re-armed the watches during its reload
    cluster
        .put(&format!("{PATH}/x"), "11".to_string())
        .expect("post-recovery update");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.get("x").as_deref(), Some("11"));
    store.shutdown().await;
}

#[tokio::test]
async fn test_own_write_becomes_visible_after_watch_roundtrip() {
    let cluster = seeded_cluster(&[]);
    let store = ConfigStore::open(Arc::new(cluster.connector()), &fast_settings())
        .await
        .expect("open");

    store.set("flush_interval", "250ms").await.expect("write");
    // visibility is eventual: the snapshot refreshes when the notification
    // for the watched path is processed
    sleep(Duration::from_millis(200)).await;
    assert_eq!(store.get("flush_interval").as_deref(), Some("250ms"));
    store.shutdown().await;
}
