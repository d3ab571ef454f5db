//! TaskQueue - the single synchronization point between driver and workers
//!
//! All mutable state lives in [`QueueState`] behind one mutex. Methods that
//! must run under the lock take `&mut QueueState`, so holding the guard is
//! enforced by the borrow checker rather than by convention.
//!
//! ## Wakeups
//!
//! - **Work**: `tokio::sync::Notify`. `notify` stores a single permit, so a
//!   burst of requeues followed by one flush costs exactly one wakeup
//! - **Startup barrier**: a `Condvar` the creating thread waits on with a
//!   deadline while workers bump the started counter

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::{debug, trace};

use crate::config::{CheckConfig, PollerConfig};
use crate::error::{ManagerError, ManagerResult};

use super::messages::{InterfaceStatus, PollerItem};

/// State guarded by the queue mutex
#[derive(Debug, Default)]
pub struct QueueState {
    /// Items returned for another check, in arrival order
    pub requeued: Vec<PollerItem>,

    /// Recorded outcomes waiting for the driver to collect them
    pub poller_items: Vec<PollerItem>,

    /// Interface observations waiting to be persisted
    pub interfaces: Vec<InterfaceStatus>,

    /// Workers that finished startup successfully
    pub workers_num: usize,

    /// Set by queue sync, consumed by the next worker that wakes up
    pub check_queue: bool,

    /// Set once by the manager before it joins the workers
    pub shutdown: bool,

    /// First worker that failed its startup, with the reason
    pub startup_failure: Option<(usize, String)>,

    /// Total work wakeups issued
    pub notifications: u64,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub requeued: usize,
    pub poller_items: usize,
    pub interfaces: usize,
    pub workers_started: usize,
    pub check_queue: bool,
    pub notifications: u64,
}

/// Result of waiting on the startup barrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupStatus {
    Ready,
    Failed { ordinal: usize, message: String },
    TimedOut { started: usize },
}

pub struct TaskQueue {
    state: Mutex<QueueState>,
    work: Notify,
    started: Condvar,
    config: CheckConfig,
}

impl TaskQueue {
    /// Validates the check configuration and allocates an empty queue
    pub fn init(config: &PollerConfig) -> ManagerResult<Self> {
        let config = CheckConfig::from_config(config).map_err(ManagerError::QueueInit)?;

        debug!(
            "task queue initialized (timeout: {:?}, batch: {}, concurrency: {})",
            config.timeout, config.batch_size, config.max_concurrency
        );

        Ok(Self {
            state: Mutex::new(QueueState {
                requeued: Vec::with_capacity(config.batch_size),
                ..QueueState::default()
            }),
            work: Notify::new(),
            started: Condvar::new(),
            config,
        })
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Acquires the queue lock
    ///
    /// A worker panicking while holding the lock must not take the whole pool
    /// down, so a poisoned mutex is recovered.
    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wakes one waiting worker, or the next one to wait
    pub fn notify(&self, state: &mut QueueState) {
        state.notifications += 1;
        self.work.notify_one();
    }

    /// Wakes every worker currently waiting for work
    pub fn notify_all(&self, state: &mut QueueState) {
        state.notifications += 1;
        self.work.notify_waiters();
    }

    /// Future completing on the next work wakeup
    ///
    /// Call `enable` on the pinned future before inspecting the state so a
    /// `notify_all` issued in between is not lost.
    pub fn notified(&self) -> Notified<'_> {
        self.work.notified()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();

        QueueStats {
            requeued: state.requeued.len(),
            poller_items: state.poller_items.len(),
            interfaces: state.interfaces.len(),
            workers_started: state.workers_num,
            check_queue: state.check_queue,
            notifications: state.notifications,
        }
    }

    /// Called by a worker thread once it is ready to take work
    pub fn worker_started(&self) {
        let mut state = self.lock();
        state.workers_num += 1;
        trace!("workers started: {}", state.workers_num);
        self.started.notify_all();
    }

    /// Called by a worker thread whose startup failed
    pub fn worker_failed(&self, ordinal: usize, message: String) {
        let mut state = self.lock();
        if state.startup_failure.is_none() {
            state.startup_failure = Some((ordinal, message));
        }
        self.started.notify_all();
    }

    /// Blocks until `expected` workers started, one failed, or `timeout` elapsed
    pub fn wait_started(&self, expected: usize, timeout: Duration) -> StartupStatus {
        let guard = self.lock();
        let (mut state, _) = self
            .started
            .wait_timeout_while(guard, timeout, |state| {
                state.workers_num < expected && state.startup_failure.is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);

        if let Some((ordinal, message)) = state.startup_failure.take() {
            return StartupStatus::Failed { ordinal, message };
        }

        if state.workers_num < expected {
            return StartupStatus::TimedOut {
                started: state.workers_num,
            };
        }

        StartupStatus::Ready
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        let state = self.lock();
        if !state.requeued.is_empty() || !state.interfaces.is_empty() {
            debug!(
                "destroying task queue with {} requeued items and {} interface records",
                state.requeued.len(),
                state.interfaces.len()
            );
        }
    }
}
