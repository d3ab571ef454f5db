//! Manager creation, startup barrier and shutdown tests
//!
//! - Exact worker counts after create
//! - Bounded startup wait with rollback on timeout or failed startup
//! - Bounded shutdown for small and large pools

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use async_poller::{AsyncManager, Checker, ManagerError};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[test]
fn test_create_starts_exact_worker_count() {
    for workers in [1, 4] {
        let (callback, _) = counting_callback();
        let manager =
            AsyncManager::create(workers, callback, create_test_args(Arc::new(CountingCheck::default())))
                .unwrap();

        assert_eq!(manager.workers_num(), workers);
        assert_eq!(manager.queue_stats().workers_started, workers);

        manager.free();
    }
}

#[test]
fn test_free_terminates_for_various_pool_sizes() {
    for workers in [1, 4, 64] {
        let (callback, _) = counting_callback();
        let manager =
            AsyncManager::create(workers, callback, create_test_args(Arc::new(CountingCheck::default())))
                .unwrap();

        // Give every worker time to park on the queue
        std::thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        manager.free();

        assert!(
            start.elapsed() < Duration::from_secs(5),
            "free of {workers} workers took {:?}",
            start.elapsed()
        );
    }
}

#[test]
fn test_stalled_worker_times_out_startup() {
    let gate = Arc::new(Gate::default());
    let checker = Arc::new(StallingCheck { gate: gate.clone() });
    let (callback, _) = counting_callback();

    let args = create_test_args(checker.clone()).with_startup_timeout(Duration::from_millis(300));

    let start = Instant::now();
    let result = AsyncManager::create(2, callback, args);
    let elapsed = start.elapsed();

    assert_matches!(
        result.err(),
        Some(ManagerError::StartupTimeout {
            started: 0,
            expected: 2,
            ..
        })
    );
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(3), "create blocked for {elapsed:?}");

    // Detached workers exit on their own once unblocked
    gate.open();
    assert!(wait_until(Duration::from_secs(5), || Arc::strong_count(&checker) == 1));
}

#[test]
fn test_startup_timeout_message() {
    let gate = Arc::new(Gate::default());
    let (callback, _) = counting_callback();
    let args = create_test_args(Arc::new(StallingCheck { gate: gate.clone() }))
        .with_startup_timeout(Duration::from_millis(100));

    let err = AsyncManager::create(1, callback, args).err().unwrap();
    gate.open();

    assert!(
        err.to_string()
            .starts_with("timeout occurred while waiting for workers to start")
    );
}

#[test]
fn test_failed_worker_startup_rolls_back() {
    let checker = Arc::new(FailingInitCheck { ordinal: 2 });
    let (callback, _) = counting_callback();

    let start = Instant::now();
    let result = AsyncManager::create(3, callback, create_test_args(checker.clone()));

    assert_matches!(
        result.err(),
        Some(ManagerError::WorkerInit { ordinal: 2, message }) if message.contains("resolver")
    );

    // A failed startup is reported without waiting for the timeout
    assert!(start.elapsed() < Duration::from_secs(5));

    // Every worker thread is gone, nothing else holds the checker
    assert!(wait_until(Duration::from_secs(5), || Arc::strong_count(&checker) == 1));
}

#[test]
fn test_drop_without_free_stops_workers() {
    let checker = Arc::new(CountingCheck::default());
    let (callback, _) = counting_callback();

    let manager = AsyncManager::create(2, callback, create_test_args(checker.clone())).unwrap();
    drop(manager);

    assert_eq!(Arc::strong_count(&checker), 1);
}

#[test]
fn test_free_releases_all_references() {
    let checker = Arc::new(CountingCheck::default());
    let (callback, counter) = counting_callback();

    let manager = AsyncManager::create(4, callback, create_test_args(checker.clone())).unwrap();
    manager.requeue(1, 0, 0);
    manager.requeue_flush();
    assert!(wait_until(Duration::from_secs(5), || counter.load(std::sync::atomic::Ordering::SeqCst) == 1));

    manager.free();

    assert_eq!(Arc::strong_count(&checker), 1);
    assert_eq!(Arc::strong_count(&counter), 1);
}

#[test]
fn test_checker_is_shared_not_cloned() {
    let checker: Arc<dyn Checker> = Arc::new(CountingCheck::default());
    let (callback, _) = counting_callback();

    let manager = AsyncManager::create(3, callback, create_test_args(checker.clone())).unwrap();

    // Test handle + one per worker thread
    assert_eq!(Arc::strong_count(&checker), 4);

    manager.free();
}
