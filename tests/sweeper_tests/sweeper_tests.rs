//! Tests for the expiry sweeper

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use weather_aggregator::store::{now_millis, StationFields, StationStore};
use weather_aggregator::sweeper::{sweep_once, SweeperHandle};

// =============================================================================
// Helper Functions
// =============================================================================

fn fields(value: Value) -> StationFields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// =============================================================================
// sweep_once Tests
// =============================================================================

#[test]
fn test_sweep_once_removes_expired_station() {
    let store = StationStore::default();
    store.upsert_at("ANCIENT", fields(json!({"id": "ANCIENT"})), 1, "o", 0);

    let removed = sweep_once(&store, Duration::from_secs(30)).unwrap();

    assert_eq!(removed, 1);
    assert!(store.get("ANCIENT").is_none());
}

#[test]
fn test_sweep_once_keeps_fresh_station() {
    let store = StationStore::default();
    store
        .upsert("FRESH", fields(json!({"id": "FRESH"})), 1, "o")
        .unwrap();

    let removed = sweep_once(&store, Duration::from_secs(30)).unwrap();

    assert_eq!(removed, 0);
    assert!(store.get("FRESH").is_some());
}

#[test]
fn test_sweep_once_on_empty_store() {
    let store = StationStore::default();
    assert_eq!(sweep_once(&store, Duration::from_millis(1)).unwrap(), 0);
}

// =============================================================================
// Background Sweeper Tests
// =============================================================================

#[test]
fn test_sweeper_evicts_within_deadline() {
    let store = Arc::new(StationStore::default());
    let now = now_millis().unwrap();
    store.upsert_at("OLD", fields(json!({"id": "OLD"})), 1, "o", now.saturating_sub(1_000));

    let handle = SweeperHandle::spawn(
        Arc::clone(&store),
        Duration::from_millis(200),
        Duration::from_millis(20),
    )
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || store.get("OLD").is_none()));
    handle.stop();
}

#[test]
fn test_sweeper_keeps_recently_updated_station() {
    let store = Arc::new(StationStore::default());

    let handle = SweeperHandle::spawn(
        Arc::clone(&store),
        Duration::from_secs(30),
        Duration::from_millis(10),
    )
    .unwrap();

    store
        .upsert("LIVE", fields(json!({"id": "LIVE"})), 1, "o")
        .unwrap();
    thread::sleep(Duration::from_millis(100));

    assert!(store.get("LIVE").is_some());
    handle.stop();
}

#[test]
fn test_stop_and_drop_join_thread() {
    let store = Arc::new(StationStore::default());

    let handle = SweeperHandle::spawn(
        Arc::clone(&store),
        Duration::from_secs(1),
        Duration::from_millis(5),
    )
    .unwrap();
    handle.stop();

    {
        let _dropped = SweeperHandle::spawn(
            Arc::clone(&store),
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .unwrap();
    }

    // Both sweeper threads have exited and released their store clones
    assert_eq!(Arc::strong_count(&store), 1);
}
