//! Failure handling in the worker pool
//!
//! - Checks exceeding the configured timeout
//! - Failing and panicking checks mixed with healthy ones
//! - A panicking completion sink
//! - The driver's requeue-on-failure round trip, with and without a schedule

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_poller::{
    AsyncManager, CheckOutcome, CheckResult, Checker, FinishedCallback, PollerArgs, PollerItem,
    config::{CheckConfig, ItemConfig, PollerConfig},
    labels::ResultCode,
    poller::sources::StaticItemSource,
    util::clock,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;

use crate::helpers::*;

/// Panics for every item divisible by ten
struct PanickyCheck;

#[async_trait]
impl Checker for PanickyCheck {
    async fn check(&self, item: &PollerItem, _config: &CheckConfig) -> CheckOutcome {
        if item.itemid % 10 == 0 {
            panic!("check of item {} blew up", item.itemid);
        }
        CheckOutcome::success("1")
    }
}

/// Enforces the configured timeout itself and reports its own message
struct SelfTimingCheck;

#[async_trait]
impl Checker for SelfTimingCheck {
    async fn check(&self, _item: &PollerItem, config: &CheckConfig) -> CheckOutcome {
        let wait = tokio::time::sleep(Duration::from_secs(30));
        match tokio::time::timeout(config.timeout, wait).await {
            Ok(()) => CheckOutcome::success("1"),
            Err(_) => CheckOutcome::failure(ResultCode::TimeoutError, "agent did not answer in time"),
        }
    }
}

#[test]
fn test_slow_check_times_out() {
    let config = PollerConfig {
        timeout: 1,
        ..PollerConfig::default()
    };
    let args = PollerArgs::new(config, Arc::new(CountingCheck::slow(Duration::from_secs(5))));
    let (callback, results) = recording_callback();
    let manager = AsyncManager::create(1, callback, args).unwrap();

    let start = Instant::now();
    manager.requeue(1, 0, 0);
    manager.requeue_flush();

    assert!(wait_until(Duration::from_secs(4), || results.lock().unwrap().len() == 1));
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(
        results.lock().unwrap()[0],
        (1, ResultCode::TimeoutError.code())
    );

    manager.free();
}

#[test]
fn test_failing_items_do_not_stall_pool() {
    let checker = Arc::new(CountingCheck::failing((1..=100).filter(|id| id % 2 == 0)));
    let (callback, results) = recording_callback();
    let manager = AsyncManager::create(3, callback, create_test_args(checker.clone())).unwrap();

    for itemid in 1..=100 {
        manager.requeue(itemid, 0, 0);
    }
    manager.requeue_flush();

    assert!(wait_until(Duration::from_secs(5), || results.lock().unwrap().len() == 100));

    let results = results.lock().unwrap();
    let failed = results
        .iter()
        .filter(|(_, errcode)| *errcode == ResultCode::NetworkError.code())
        .count();
    assert_eq!(failed, 50);
    assert!(
        results
            .iter()
            .all(|(itemid, errcode)| (*errcode == 0) == (itemid % 2 == 1))
    );

    manager.free();
}

#[test]
fn test_panicking_checks_are_reported_as_failures() {
    let (callback, results) = recording_callback();
    let manager = AsyncManager::create(2, callback, create_test_args(Arc::new(PanickyCheck))).unwrap();

    for itemid in 1..=30 {
        manager.requeue(itemid, 0, 0);
    }
    manager.requeue_flush();

    assert!(wait_until(Duration::from_secs(5), || results.lock().unwrap().len() == 30));

    let mut failed: Vec<u64> = results
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, errcode)| *errcode == ResultCode::Fail.code())
        .map(|(itemid, _)| *itemid)
        .collect();
    failed.sort_unstable();
    assert_eq!(failed, vec![10, 20, 30]);

    // Workers survived and keep taking work
    assert_eq!(manager.queue_stats().workers_started, 2);
    manager.requeue(31, 0, 0);
    manager.requeue_flush();
    assert!(wait_until(Duration::from_secs(5), || results.lock().unwrap().len() == 31));

    manager.free();
}

#[test]
fn test_failed_items_requeued_by_driver() {
    let checker = Arc::new(CountingCheck::failing([3, 7]));
    let (callback, counter) = counting_callback();
    let manager = AsyncManager::create(2, callback, create_test_args(checker.clone())).unwrap();

    for itemid in 1..=10 {
        manager.requeue(itemid, 0, 0);
    }
    manager.requeue_flush();
    assert!(wait_until(Duration::from_secs(5), || counter.load(Ordering::SeqCst) == 10));

    let mut collected = Vec::new();
    manager.queue_get(&mut collected);

    for item in collected.iter().filter(|item| item.errcode != 0) {
        manager.requeue(item.itemid, item.errcode, item.lastclock);
    }
    manager.requeue_flush();

    assert!(wait_until(Duration::from_secs(5), || counter.load(Ordering::SeqCst) == 12));
    assert_eq!(checker.count(), 12);

    // The retried triples carry the previous failure
    let seen = checker.seen.lock().unwrap();
    let retried: Vec<&PollerItem> = seen[10..].iter().collect();
    assert!(
        retried
            .iter()
            .all(|item| item.errcode == ResultCode::NetworkError.code() && item.lastclock > 0)
    );

    drop(seen);
    manager.free();
}

#[test]
fn test_checker_timeout_message_is_kept() {
    let config = PollerConfig {
        timeout: 1,
        ..PollerConfig::default()
    };
    let errors: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let recorded = errors.clone();
    let callback: FinishedCallback = Arc::new(move |result: CheckResult| {
        recorded.lock().unwrap().push(result.error);
    });

    let manager =
        AsyncManager::create(1, callback, PollerArgs::new(config, Arc::new(SelfTimingCheck))).unwrap();

    manager.requeue(1, 0, 0);
    manager.requeue_flush();

    assert!(wait_until(Duration::from_secs(4), || errors.lock().unwrap().len() == 1));
    assert_eq!(
        errors.lock().unwrap()[0].as_deref(),
        Some("agent did not answer in time")
    );

    manager.free();
}

#[test]
fn test_panicking_callback_keeps_worker_alive() {
    let calls = Arc::new(AtomicUsize::new(0));
    let callback_calls = calls.clone();
    let callback: FinishedCallback = Arc::new(move |result: CheckResult| {
        callback_calls.fetch_add(1, Ordering::SeqCst);
        if result.itemid == 1 {
            panic!("sink rejected item {}", result.itemid);
        }
    });

    let manager =
        AsyncManager::create(1, callback, create_test_args(Arc::new(CountingCheck::default()))).unwrap();

    for itemid in 1..=3 {
        manager.requeue(itemid, 0, 0);
    }
    manager.requeue_flush();

    // The rest of the batch still completes
    assert!(wait_until(Duration::from_secs(5), || calls.load(Ordering::SeqCst) == 3));

    // And the only worker keeps taking work
    manager.requeue(4, 0, 0);
    manager.requeue_flush();
    assert!(wait_until(Duration::from_secs(5), || calls.load(Ordering::SeqCst) == 4));

    let stats = manager.queue_stats();
    assert_eq!(stats.requeued, 0);
    assert_eq!(stats.poller_items, 4);

    manager.free();
}

#[test]
fn test_failing_item_waits_for_its_delay() {
    let items = vec![ItemConfig {
        itemid: 1,
        address: "127.0.0.1:9".to_string(),
        delay: 60,
        interfaceid: None,
        key: None,
    }];
    let checker = Arc::new(CountingCheck::failing([1]));
    let source = Arc::new(StaticItemSource::new(&items, clock()));
    let (callback, _) = counting_callback();
    let manager =
        AsyncManager::create(1, callback, create_test_args(checker.clone()).with_source(source)).unwrap();

    manager.queue_sync();
    assert!(wait_until(Duration::from_secs(5), || checker.count() == 1));

    // Several driver ticks, each requeueing what failed
    for _ in 0..5 {
        std::thread::sleep(Duration::from_millis(30));

        let mut collected = Vec::new();
        manager.queue_get(&mut collected);
        for item in collected.iter().filter(|item| item.errcode != 0) {
            manager.requeue(item.itemid, item.errcode, item.lastclock);
        }

        manager.requeue_flush();
        manager.queue_sync();
    }

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(checker.count(), 1);
    assert_eq!(manager.queue_stats().requeued, 0);

    manager.free();
}
