//! Worker - one OS thread draining the shared task queue
//!
//! Each worker owns a current-thread tokio runtime, so the checks of one batch
//! run concurrently as non-blocking futures while workers stay independent.
//!
//! ## Loop
//!
//! ```text
//! enable wakeup → lock → take task → unlock → check items → record + callback
//!       ↑                    │ (nothing to do)
//!       └── select { work notification, stop request }
//! ```
//!
//! The queue lock is never held across a check or a callback.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures::{FutureExt, StreamExt, stream};
use tokio::sync::watch;
use tracing::{debug, error, instrument, trace, warn};

use crate::checks::{CheckOutcome, Checker};
use crate::config::CheckConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::labels::ResultCode;
use crate::util::clock;

use super::messages::{CheckResult, FinishedCallback, InterfaceStatus, PollerItem};
use super::queue::{QueueState, TaskQueue};
use super::sources::{AvailabilitySink, ItemSource};
use super::timekeeper::{Timekeeper, UnitState};

/// Extra time a checker gets to report its own timeout before the worker
/// cuts the check off
const TIMEOUT_GRACE: Duration = Duration::from_millis(500);

/// Collaborators shared by every worker of a manager
#[derive(Clone)]
pub struct WorkerContext {
    pub checker: Arc<dyn Checker>,
    pub source: Option<Arc<dyn ItemSource>>,
    pub availability: Option<Arc<dyn AvailabilitySink>>,
    pub timekeeper: Arc<Timekeeper>,
}

/// Work taken from the queue in one lock acquisition
#[derive(Debug, Default)]
struct WorkerTask {
    requeued: Vec<PollerItem>,
    check_queue: bool,
    interfaces: Vec<InterfaceStatus>,
}

type SharedCallback = Arc<RwLock<Option<FinishedCallback>>>;

pub struct Worker {
    ordinal: usize,
    handle: Option<JoinHandle<()>>,
    stop_tx: watch::Sender<bool>,
    ready: Arc<AtomicBool>,
    finished_cb: SharedCallback,
}

impl Worker {
    /// Spawns the worker thread
    ///
    /// The thread reports through the queue once it is ready for work (or
    /// failed to get there); this call does not wait for it.
    pub fn init(ordinal: usize, queue: Arc<TaskQueue>, context: WorkerContext) -> ManagerResult<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let ready = Arc::new(AtomicBool::new(false));
        let finished_cb: SharedCallback = Arc::new(RwLock::new(None));

        let worker_loop = WorkerLoop {
            ordinal,
            queue,
            context,
            stop_rx,
            finished_cb: finished_cb.clone(),
        };

        let thread_ready = ready.clone();
        let handle = thread::Builder::new()
            .name(format!("poller-worker-{ordinal}"))
            .spawn(move || worker_loop.run(thread_ready))
            .map_err(|source| ManagerError::WorkerSpawn { ordinal, source })?;

        Ok(Self {
            ordinal,
            handle: Some(handle),
            stop_tx,
            ready,
            finished_cb,
        })
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Registers the sink invoked after every unit of work
    pub fn set_finished_cb(&self, callback: FinishedCallback) {
        *self
            .finished_cb
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Whether the thread got past its startup phase, successfully or not
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Asks the run loop to exit once its current unit of work completes
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Joins the worker thread
    pub fn destroy(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("worker #{} terminated with a panic", self.ordinal);
            }
        }
    }

    /// Lets the thread exit on its own; used for workers stuck in startup
    pub fn detach(mut self) {
        if self.handle.take().is_some() {
            warn!("worker #{} did not start, detaching it", self.ordinal);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the worker thread
struct WorkerLoop {
    ordinal: usize,
    queue: Arc<TaskQueue>,
    context: WorkerContext,
    stop_rx: watch::Receiver<bool>,
    finished_cb: SharedCallback,
}

impl WorkerLoop {
    fn run(self, ready: Arc<AtomicBool>) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("worker #{}: cannot create runtime: {e}", self.ordinal);
                ready.store(true, Ordering::SeqCst);
                self.queue
                    .worker_failed(self.ordinal, format!("cannot create runtime: {e}"));
                return;
            }
        };

        if let Err(e) = self.context.checker.init_worker(self.ordinal) {
            error!("worker #{}: initialization failed: {e:#}", self.ordinal);
            ready.store(true, Ordering::SeqCst);
            self.queue.worker_failed(self.ordinal, format!("{e:#}"));
            return;
        }

        ready.store(true, Ordering::SeqCst);
        self.queue.worker_started();

        runtime.block_on(self.run_loop());
    }

    #[instrument(skip(self), fields(worker = self.ordinal))]
    async fn run_loop(mut self) {
        debug!("starting worker");

        let index = self.ordinal - 1;

        loop {
            let notified = self.queue.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if *self.stop_rx.borrow() {
                break;
            }

            let task = {
                let mut state = self.queue.lock();
                if state.shutdown {
                    break;
                }
                self.take_task(&mut state)
            };

            match task {
                Some(task) => {
                    self.context.timekeeper.update(index, UnitState::Busy);
                    self.process(task).await;
                    self.context.timekeeper.update(index, UnitState::Idle);
                }
                None => {
                    tokio::select! {
                        _ = notified.as_mut() => {
                            trace!("woken up");
                        }

                        _ = self.stop_rx.changed() => {
                            debug!("received stop request");
                            break;
                        }
                    }
                }
            }
        }

        debug!("worker stopped");
    }

    /// Takes the next batch; must be called with the queue locked
    fn take_task(&self, state: &mut QueueState) -> Option<WorkerTask> {
        let count = state.requeued.len().min(self.queue.config().batch_size);
        let requeued: Vec<PollerItem> = state.requeued.drain(..count).collect();
        let check_queue = std::mem::take(&mut state.check_queue);

        let interfaces = if self.context.availability.is_some() {
            std::mem::take(&mut state.interfaces)
        } else {
            Vec::new()
        };

        // Leftovers go to whichever worker is free next
        if !state.requeued.is_empty() {
            self.queue.notify(state);
        }

        if requeued.is_empty() && !check_queue && interfaces.is_empty() {
            return None;
        }

        Some(WorkerTask {
            requeued,
            check_queue,
            interfaces,
        })
    }

    async fn process(&self, task: WorkerTask) {
        let WorkerTask {
            requeued,
            check_queue,
            interfaces,
        } = task;

        if let Some(sink) = &self.context.availability {
            if !interfaces.is_empty() {
                let count = interfaces.len();
                if let Err(e) = sink.update_interfaces(interfaces) {
                    error!("failed to update availability of {count} interfaces: {e:#}");
                }
            }
        }

        let config = self.queue.config();

        // With a source the schedule decides when a requeued item is due again
        let mut items = match &self.context.source {
            Some(source) => {
                if !requeued.is_empty() {
                    trace!("rescheduling {} requeued items", requeued.len());
                    source.requeue_items(&requeued, clock());
                }
                Vec::new()
            }
            None => requeued,
        };

        if check_queue {
            if let Some(source) = &self.context.source {
                let due = source.due_items(clock(), config.batch_size);
                trace!("{} items due", due.len());
                items.extend(due);
            }
        }

        if items.is_empty() {
            return;
        }

        debug!("checking {} items", items.len());

        let mut results = stream::iter(items)
            .map(|item| self.check_item(item, config))
            .buffer_unordered(config.max_concurrency);

        while let Some(result) = results.next().await {
            self.complete(result);
        }
    }

    async fn check_item(&self, item: PollerItem, config: &CheckConfig) -> CheckResult {
        let check = AssertUnwindSafe(self.context.checker.check(&item, config)).catch_unwind();

        let outcome = match tokio::time::timeout(config.timeout + TIMEOUT_GRACE, check).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                error!("check of item {} panicked", item.itemid);
                CheckOutcome::failure(ResultCode::Fail, "check terminated unexpectedly")
            }
            Err(_) => CheckOutcome::failure(
                ResultCode::TimeoutError,
                format!(
                    "timeout while executing check ({}s)",
                    config.timeout.as_secs()
                ),
            ),
        };

        into_result(item.itemid, clock(), outcome)
    }

    /// Records the outcome in the queue, then reports it to the sink
    fn complete(&self, result: CheckResult) {
        if !result.is_success() {
            debug!(
                "item {} failed with {}: {}",
                result.itemid,
                ResultCode::label(result.errcode),
                result.error.as_deref().unwrap_or_default()
            );
        }

        self.queue.lock().poller_items.push(result.as_item());

        let callback = self
            .finished_cb
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(callback) = callback {
            let itemid = result.itemid;
            if panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                error!("finished callback panicked for item {itemid}");
            }
        }
    }
}

fn into_result(itemid: u64, lastclock: i64, outcome: CheckOutcome) -> CheckResult {
    let errcode = outcome.code().code();
    let (value, error) = match outcome.value {
        Ok(value) => (Some(value), None),
        Err(failure) => (None, Some(failure.message)),
    };

    let interface = outcome
        .interface
        .map(|(interfaceid, key_orig)| InterfaceStatus {
            interfaceid,
            itemid,
            errcode,
            lastclock,
            key_orig,
            error: error.clone(),
        });

    CheckResult {
        itemid,
        errcode,
        lastclock,
        value,
        error,
        interface,
    }
}
