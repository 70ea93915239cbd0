//! Concurrent admission checks.

use admission_control::infrastructure::mocks::MockClock;
use admission_control::{AdmissionService, Timestamp};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn service(max: u32) -> AdmissionService {
    AdmissionService::builder()
        .with_policy("upload", max, Duration::from_secs(3_600))
        .with_clock(Arc::new(MockClock::new(Timestamp::from_millis(1_000))))
        .build()
        .unwrap()
}

#[test]
fn test_one_key_admits_exactly_max() {
    let service = service(50);
    let threads = 16;
    let per_thread = 20;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread)
                    .map(|_| service.check_admission("upload", "user:1"))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    let admitted: Vec<_> = results.iter().filter(|r| r.allowed).collect();
    assert_eq!(admitted.len(), 50);
    assert_eq!(results.len() - admitted.len(), 16 * 20 - 50);

    // Every remaining value from 49 down to 0 was handed out exactly once
    let mut remaining: Vec<u32> = admitted.iter().map(|r| r.remaining).collect();
    remaining.sort_unstable();
    assert_eq!(remaining, (0..50).collect::<Vec<_>>());

    assert!(results.iter().all(|r| !r.degraded));
    assert_eq!(service.metrics().admitted(), 50);
    assert_eq!(service.metrics().denied(), 16 * 20 - 50);
}

#[test]
fn test_distinct_keys_progress_independently() {
    let service = service(10);
    let callers = 32;

    let handles: Vec<_> = (0..callers)
        .map(|i| {
            let service = service.clone();
            thread::spawn(move || {
                let caller = format!("user:{}", i);
                (0..15)
                    .filter(|_| service.check_admission("upload", &caller).allowed)
                    .count()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 10);
    }
    assert_eq!(service.tracked_keys(), callers);
}

#[test]
fn test_scavenging_during_traffic_keeps_decisions() {
    let clock = Arc::new(MockClock::new(Timestamp::UNIX_EPOCH));
    let service = AdmissionService::builder()
        .with_policy("general", 5, Duration::from_secs(60))
        .with_clock(clock.clone())
        .build()
        .unwrap();

    let worker = {
        let service = service.clone();
        thread::spawn(move || {
            (0..10)
                .filter(|_| service.check_admission("general", "user:1").allowed)
                .count()
        })
    };
    let sweeper = {
        let service = service.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                service.scavenge().unwrap();
            }
        })
    };

    sweeper.join().unwrap();
    // Nothing has expired, so sweeping cannot reset the window
    assert_eq!(worker.join().unwrap(), 5);
    assert_eq!(service.metrics().scavenged(), 0);
}
