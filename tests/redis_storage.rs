//! Integration tests for the Redis counter store.
//!
//! These tests require Redis 6.2+ at `redis://127.0.0.1/`.
//! Tests are ignored by default - run with `cargo test --features redis-storage --test redis_storage -- --ignored`

#![cfg(feature = "redis-storage")]

use admission_control::application::ports::CounterStore;
use admission_control::{
    AdmissionService, CounterKey, CounterState, RedisCounterStore, RedisStorageConfig, Timestamp,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

const REDIS_URL: &str = "redis://127.0.0.1/";

/// Check if Redis is available before running tests
async fn redis_available() -> bool {
    RedisCounterStore::connect(REDIS_URL).await.is_ok()
}

/// Create a store under a prefix unique to the test, starting empty
async fn create_test_store(test_name: &str) -> RedisCounterStore {
    let config = RedisStorageConfig {
        key_prefix: format!("test:admission:{}:", test_name),
        ..Default::default()
    };

    let store = RedisCounterStore::connect_with_config(REDIS_URL, config)
        .await
        .expect("Failed to connect to Redis");
    store.clear_async().await.unwrap();
    store
}

fn now() -> Timestamp {
    Timestamp::from_system_time(SystemTime::now())
}

fn far_future() -> Timestamp {
    now().saturating_add(Duration::from_secs(300))
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_key_format() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available at {}", REDIS_URL);
        return;
    }

    let store = RedisCounterStore::connect(REDIS_URL).await.unwrap();

    assert_eq!(
        store.redis_key(&CounterKey::new("auth", "ip:1.2.3.4")),
        "admission:4:auth:ip:1.2.3.4"
    );
    assert_ne!(
        store.redis_key(&CounterKey::new("a:b", "c")),
        store.redis_key(&CounterKey::new("a", "b:c"))
    );
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_get_set() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available at {}", REDIS_URL);
        return;
    }

    let store = create_test_store("get_set").await;
    let key = CounterKey::new("auth", "user:1");
    assert_eq!(store.get_async(&key).await.unwrap(), None);

    let state = CounterState {
        count: 3,
        window_reset_at: far_future(),
    };
    store.set_async(&key, state).await.unwrap();
    assert_eq!(store.get_async(&key).await.unwrap(), Some(state));

    // The synchronous interface sees the same data
    assert_eq!(store.get(&key).unwrap(), Some(state));

    // Keys are not counted; the emptiness check agrees with the count
    assert_eq!(store.len(), 0);
    assert!(store.is_empty());

    store.clear_async().await.unwrap();
    assert_eq!(store.get_async(&key).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_keys_expire_with_window() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let store = create_test_store("expiry").await;
    let key = CounterKey::new("auth", "user:1");
    let state = CounterState {
        count: 1,
        window_reset_at: now().saturating_add(Duration::from_millis(200)),
    };
    store.set_async(&key, state).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.get_async(&key).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires Redis
async fn test_redis_concurrent_increments_are_not_lost() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let store = Arc::new(create_test_store("cas").await);
    let reset_at = far_future();
    let key = CounterKey::new("mint", "wallet:0xabc");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    store
                        .read_modify_write_async(&key, |prior| {
                            let count = prior.map_or(0, |s| s.count) + 1;
                            (
                                CounterState {
                                    count,
                                    window_reset_at: reset_at,
                                },
                                (),
                            )
                        })
                        .await
                        .unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let state = store.get_async(&key).await.unwrap().unwrap();
    assert_eq!(state.count, 80);
    store.clear_async().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_backed_service_shares_quota() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let store = create_test_store("shared_quota").await;
    let first = AdmissionService::builder()
        .with_policy("auth", 5, Duration::from_secs(60))
        .with_store(store.clone())
        .build()
        .unwrap();
    let second = AdmissionService::builder()
        .with_policy("auth", 5, Duration::from_secs(60))
        .with_store(store.clone())
        .build()
        .unwrap();

    for _ in 0..3 {
        assert!(first.check_admission("auth", "ip:1.2.3.4").allowed);
    }
    let result = second.check_admission("auth", "ip:1.2.3.4");
    assert!(result.allowed);
    assert_eq!(result.remaining, 1);
    assert!(!result.degraded);

    assert!(second.check_admission("auth", "ip:1.2.3.4").allowed);
    assert!(!first.check_admission("auth", "ip:1.2.3.4").allowed);

    store.clear_async().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires Redis
async fn test_redis_backed_service_exact_admissions() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let store = create_test_store("exact").await;
    let service = Arc::new(
        AdmissionService::builder()
            .with_policy("upload", 10, Duration::from_secs(3_600))
            .with_store(store.clone())
            .build()
            .unwrap(),
    );

    let admitted = tokio::task::spawn_blocking(move || {
        let handles: Vec<_> = (0..25)
            .map(|_| {
                let service = service.clone();
                thread::spawn(move || service.check_admission("upload", "user:7").allowed)
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count()
    })
    .await
    .unwrap();

    assert_eq!(admitted, 10);
    store.clear_async().await.unwrap();
}
