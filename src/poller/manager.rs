//! AsyncManager - owns the worker pool and the task queue
//!
//! ## Lifecycle
//!
//! ```text
//! create: init queue → spawn N workers → wait (bounded) until N report started
//! free:   stop flags + shutdown + wake all (under lock) → join → drop queue
//! ```
//!
//! A failed `create` rolls everything back before returning; the caller
//! never sees a half-built manager.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, error, instrument, trace};

use crate::checks::Checker;
use crate::config::PollerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::labels::ProgramType;

use super::messages::{FinishedCallback, InterfaceStatus, PollerItem};
use super::queue::{QueueStats, StartupStatus, TaskQueue};
use super::sources::{AvailabilitySink, ItemSource};
use super::timekeeper::{Timekeeper, WorkerLoad};
use super::worker::{Worker, WorkerContext};

/// Everything a manager needs besides its pool size and completion sink
#[derive(Clone)]
pub struct PollerArgs {
    pub config: PollerConfig,
    pub checker: Arc<dyn Checker>,
    pub source: Option<Arc<dyn ItemSource>>,
    pub availability: Option<Arc<dyn AvailabilitySink>>,

    /// How long `create` waits for all workers to report as started
    pub startup_timeout: Duration,
}

impl PollerArgs {
    pub fn new(config: PollerConfig, checker: Arc<dyn Checker>) -> Self {
        let startup_timeout = Duration::from_secs(config.startup_timeout);

        Self {
            config,
            checker,
            source: None,
            availability: None,
            startup_timeout,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ItemSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_availability(mut self, availability: Arc<dyn AvailabilitySink>) -> Self {
        self.availability = Some(availability);
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

pub struct AsyncManager {
    workers: Vec<Worker>,
    workers_num: usize,
    program_type: ProgramType,
    revision: AtomicU64,
    queue: Arc<TaskQueue>,
    timekeeper: Arc<Timekeeper>,
}

impl AsyncManager {
    /// Creates the queue and `workers_num` workers, then waits until all run
    ///
    /// Blocks the calling thread for at most the startup timeout.
    #[instrument(skip(finished_cb, args))]
    pub fn create(
        workers_num: usize,
        finished_cb: FinishedCallback,
        args: PollerArgs,
    ) -> ManagerResult<Self> {
        debug!("In create() workers:{workers_num}");

        if workers_num == 0 {
            return Err(ManagerError::InvalidConfig(
                "at least one worker is required".to_string(),
            ));
        }

        let queue = Arc::new(TaskQueue::init(&args.config)?);
        let timekeeper = Arc::new(Timekeeper::new(workers_num));

        let mut manager = Self {
            workers: Vec::with_capacity(workers_num),
            workers_num,
            program_type: args.config.program_type,
            revision: AtomicU64::new(0),
            queue,
            timekeeper: timekeeper.clone(),
        };

        let context = WorkerContext {
            checker: args.checker,
            source: args.source,
            availability: args.availability,
            timekeeper,
        };

        let result = manager.start_workers(finished_cb, context, args.startup_timeout);

        match &result {
            Ok(()) => debug!("End of create() ret:SUCCEED"),
            Err(e) => {
                error!("End of create() ret:FAIL error:{e}");
                manager.rollback();
            }
        }

        result.map(|()| manager)
    }

    fn start_workers(
        &mut self,
        finished_cb: FinishedCallback,
        context: WorkerContext,
        startup_timeout: Duration,
    ) -> ManagerResult<()> {
        for ordinal in 1..=self.workers_num {
            let worker = Worker::init(ordinal, self.queue.clone(), context.clone())?;
            worker.set_finished_cb(finished_cb.clone());
            self.workers.push(worker);
        }

        match self.queue.wait_started(self.workers_num, startup_timeout) {
            StartupStatus::Ready => Ok(()),
            StartupStatus::Failed { ordinal, message } => {
                Err(ManagerError::WorkerInit { ordinal, message })
            }
            StartupStatus::TimedOut { started } => Err(ManagerError::StartupTimeout {
                started,
                expected: self.workers_num,
                timeout: startup_timeout,
            }),
        }
    }

    /// Signals every worker to stop and wakes all of them
    fn stop_workers(&self) {
        let mut state = self.queue.lock();

        for worker in &self.workers {
            worker.stop();
        }

        state.shutdown = true;
        self.queue.notify_all(&mut state);
    }

    /// Tears down a manager whose startup failed
    fn rollback(&mut self) {
        self.stop_workers();

        for worker in self.workers.drain(..) {
            if worker.is_ready() {
                worker.destroy();
            } else {
                worker.detach();
            }
        }
    }

    fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        debug!("stopping {} workers", self.workers.len());

        self.stop_workers();

        for worker in self.workers.drain(..) {
            worker.destroy();
        }
    }

    /// Stops all workers, waits for them to exit and releases the queue
    #[instrument(skip(self))]
    pub fn free(mut self) {
        self.shutdown();
        debug!("manager released");
    }

    /// Moves every recorded outcome into `poller_items`
    pub fn queue_get(&self, poller_items: &mut Vec<PollerItem>) {
        let mut state = self.queue.lock();

        if !state.poller_items.is_empty() {
            poller_items.append(&mut state.poller_items);
        }
    }

    /// Returns an item for another check; takes effect on the next flush
    pub fn requeue(&self, itemid: u64, errcode: i32, lastclock: i64) {
        self.queue
            .lock()
            .requeued
            .push(PollerItem::new(itemid, errcode, lastclock));
    }

    /// Wakes one worker if anything was requeued
    pub fn requeue_flush(&self) {
        let mut state = self.queue.lock();

        if !state.requeued.is_empty() {
            trace!("flushing {} requeued items", state.requeued.len());
            self.queue.notify(&mut state);
        }
    }

    /// Makes the next woken worker refill from the item source
    pub fn queue_sync(&self) {
        let mut state = self.queue.lock();

        state.check_queue = true;
        self.queue.notify(&mut state);
    }

    /// Moves every record out of `interfaces` into the queue
    ///
    /// The map is left empty; the queue becomes the sole owner of the records.
    pub fn interfaces_flush(&self, interfaces: &mut HashMap<u64, InterfaceStatus>) {
        if interfaces.is_empty() {
            return;
        }

        let mut state = self.queue.lock();
        state
            .interfaces
            .extend(interfaces.drain().map(|(_, interface)| interface));
    }

    /// Takes interface records that no availability sink consumed
    pub fn interfaces_take(&self) -> Vec<InterfaceStatus> {
        std::mem::take(&mut self.queue.lock().interfaces)
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn worker_loads(&self) -> Vec<WorkerLoad> {
        self.timekeeper.snapshot()
    }

    pub fn workers_num(&self) -> usize {
        self.workers_num
    }

    pub fn program_type(&self) -> ProgramType {
        self.program_type
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn set_revision(&self, revision: u64) {
        self.revision.store(revision, Ordering::SeqCst);
    }
}

impl Drop for AsyncManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
