//! Asynchronous polling core
//!
//! A manager owns a fixed pool of worker threads and one shared task queue.
//! The driver loop feeds the queue and harvests what the workers produce.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ┌──────────────────────┐  requeue / requeue_flush / queue_sync / interfaces_flush
//!   │  Driver loop (caller) │ ──────────────────────────────────────────┐
//!   └──────────▲───────────┘                                            │
//!              │ finished callback            queue_get                 ▼
//!              │ (any worker thread)   ◄────────────────────  ┌──────────────────┐
//!              │                                              │    TaskQueue     │
//!   ┌──────────┴───────────┐    take batch / record outcome   │  (one mutex)     │
//!   │  Worker 1..N          │ ◄──────────────────────────────► │                  │
//!   │  (thread + runtime)   │                                  └──────────────────┘
//!   └──────────┬───────────┘
//!              │ check(item)                 due_items / update_interfaces
//!              ▼                                       ▼
//!        [ Checker ]                      [ ItemSource, AvailabilitySink ]
//! ```
//!
//! ## Components
//!
//! - **TaskQueue**: requeued items, recorded outcomes, interface records, flags
//! - **Worker**: takes a batch, checks it without holding the lock, reports
//! - **AsyncManager**: lifecycle (bounded startup, ordered shutdown) and the
//!   data exchange API used by the driver
//! - **Timekeeper**: busy/idle accounting per worker

pub mod manager;
pub mod messages;
pub mod queue;
pub mod sources;
pub mod timekeeper;
pub mod worker;
