//! Records exchanged between the driver loop, the task queue and workers
//!
//! ## Ownership
//!
//! 1. **PollerItem**: plain `Copy` triple, owned by whichever buffer holds it
//! 2. **InterfaceStatus**: owns heap strings and is intentionally not `Clone`.
//!    It moves worker → driver → queue → availability sink, one owner at a time
//! 3. **CheckResult**: handed to the finished callback by reference

use std::sync::Arc;

use crate::labels::ResultCode;

/// One scheduled check: item id plus the outcome of its previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PollerItem {
    pub itemid: u64,

    /// Result code of the last check (opaque to the queue)
    pub errcode: i32,

    /// Unix time the last check completed
    pub lastclock: i64,
}

impl PollerItem {
    pub fn new(itemid: u64, errcode: i32, lastclock: i64) -> Self {
        Self {
            itemid,
            errcode,
            lastclock,
        }
    }
}

/// Latest availability observation for one host interface
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub interfaceid: u64,

    /// Item whose check produced this observation
    pub itemid: u64,

    pub errcode: i32,
    pub lastclock: i64,

    /// Key of the originating item, as configured
    pub key_orig: Option<String>,

    pub error: Option<String>,
}

impl InterfaceStatus {
    pub fn is_available(&self) -> bool {
        self.errcode == ResultCode::Succeed.code()
    }

    /// Releases the owned strings, keeping the identifying fields
    pub fn clean(&mut self) {
        self.key_orig = None;
        self.error = None;
    }

    /// Moves the record out, leaving an empty one behind
    pub fn take(&mut self) -> InterfaceStatus {
        std::mem::take(self)
    }
}

/// What a worker produced for one unit of work
#[derive(Debug, PartialEq, Eq)]
pub struct CheckResult {
    pub itemid: u64,
    pub errcode: i32,
    pub lastclock: i64,
    pub value: Option<String>,
    pub error: Option<String>,

    /// Interface observation, when the check is bound to an interface
    pub interface: Option<InterfaceStatus>,
}

impl CheckResult {
    pub fn is_success(&self) -> bool {
        self.errcode == ResultCode::Succeed.code()
    }

    /// The outcome as it is recorded in the queue
    pub fn as_item(&self) -> PollerItem {
        PollerItem::new(self.itemid, self.errcode, self.lastclock)
    }
}

/// Completion sink invoked by workers after every unit of work
///
/// The result is handed over by value, so the sink becomes the owner of its
/// interface record. Called concurrently from any worker thread; whatever
/// state the closure captures must do its own synchronization.
pub type FinishedCallback = Arc<dyn Fn(CheckResult) + Send + Sync>;
