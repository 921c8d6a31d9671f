//! Background task execution for Spool.
//!
//! A [`BackgroundWorker`] owns one named thread that drains a bounded FIFO
//! queue of boxed closures. Producers never block: a full queue rejects the
//! task and says so.
//!
//! # Design Rules
//!
//! 1. Exactly one task executes at a time, in submission order.
//! 2. Capacity counts queued tasks plus the one executing.
//! 3. `submit` never blocks; rejection is an explicit `Err` and a `warn!`.
//! 4. A panicking task is caught and logged; the thread keeps serving.
//! 5. `kill` discards un-started tasks and never interrupts a running one.

pub mod error;
pub mod worker;

pub use error::{WorkerError, WorkerResult};
pub use worker::{BackgroundWorker, FlushOutcome, Task, WorkerStats, DEFAULT_QUEUE_CAPACITY};
