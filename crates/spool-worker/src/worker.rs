use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use crate::error::{WorkerError, WorkerResult};

/// Default number of outstanding tasks before submissions are rejected.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2_000;

const THREAD_NAME: &str = "spool-worker";

/// A unit of background work, executed exactly once.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Result of waiting for the queue to drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Whether every submitted task finished before the deadline.
    pub drained: bool,
    /// Tasks dropped without running because the deadline passed.
    pub abandoned: usize,
}

/// Snapshot of worker counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub accepted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub panicked: u64,
    pub abandoned: u64,
}

struct State {
    queue: VecDeque<Task>,
    running: bool,
    shutdown: bool,
}

impl State {
    fn outstanding(&self) -> usize {
        self.queue.len() + usize::from(self.running)
    }
}

struct Shared {
    state: Mutex<State>,
    /// Signalled when a task is queued or shutdown begins.
    work_ready: Condvar,
    /// Signalled when the worker goes idle or shuts down.
    idle: Condvar,
    capacity: usize,
    accepted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    abandoned: AtomicU64,
}

/// Bounded FIFO queue drained by a single background thread.
pub struct BackgroundWorker {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl BackgroundWorker {
    /// Start a worker thread accepting at most `capacity` outstanding tasks.
    ///
    /// A capacity of zero is raised to one.
    pub fn spawn(capacity: usize) -> WorkerResult<Self> {
        let capacity = capacity.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                running: false,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
            capacity,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        });

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(shared)
            })?;
        let thread_id = handle.thread().id();

        debug!(capacity, "background worker started");
        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
            thread_id,
        })
    }

    /// Queue `task` without blocking.
    pub fn submit<F>(&self, task: F) -> WorkerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            drop(state);
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("background worker is shut down; task dropped");
            return Err(WorkerError::Shutdown);
        }
        if state.outstanding() >= self.shared.capacity {
            drop(state);
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                capacity = self.shared.capacity,
                "background worker queue full; task dropped"
            );
            return Err(WorkerError::QueueFull {
                capacity: self.shared.capacity,
            });
        }

        state.queue.push_back(Box::new(task));
        self.shared.accepted.fetch_add(1, Ordering::Relaxed);
        self.shared.work_ready.notify_one();
        Ok(())
    }

    /// Block until the queue drains or `timeout` elapses.
    ///
    /// On timeout, tasks that have not started are dropped; the task already
    /// executing is left to finish.
    pub fn flush(&self, timeout: Duration) -> FlushOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();

        while !state.shutdown && state.outstanding() > 0 {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        if state.outstanding() == 0 {
            return FlushOutcome {
                drained: true,
                abandoned: 0,
            };
        }

        let dropped: Vec<Task> = state.queue.drain(..).collect();
        drop(state);

        let abandoned = dropped.len();
        self.shared
            .abandoned
            .fetch_add(abandoned as u64, Ordering::Relaxed);
        if abandoned > 0 {
            warn!(
                abandoned,
                timeout_ms = timeout.as_millis() as u64,
                "flush timed out; abandoning queued tasks"
            );
        }
        drop(dropped);

        FlushOutcome {
            drained: false,
            abandoned,
        }
    }

    /// [`flush`](Self::flush), then hand the outcome to `callback`.
    pub fn flush_with<F>(&self, timeout: Duration, callback: F) -> FlushOutcome
    where
        F: FnOnce(FlushOutcome),
    {
        let outcome = self.flush(timeout);
        callback(outcome);
        outcome
    }

    /// Stop the worker. Idempotent.
    ///
    /// Queued tasks are discarded. The thread is joined unless `kill` runs on
    /// the worker thread itself.
    pub fn kill(&self) {
        let dropped: Vec<Task> = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.work_ready.notify_all();
            self.shared.idle.notify_all();
            state.queue.drain(..).collect()
        };
        if !dropped.is_empty() {
            self.shared
                .abandoned
                .fetch_add(dropped.len() as u64, Ordering::Relaxed);
            debug!(discarded = dropped.len(), "discarding queued tasks");
        }
        drop(dropped);

        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if thread::current().id() == self.thread_id {
            debug!("kill called on worker thread; not joining");
            return;
        }
        if handle.join().is_err() {
            error!("background worker thread terminated abnormally");
        }
        debug!("background worker stopped");
    }

    /// Tasks queued plus the one executing.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().outstanding()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Whether [`kill`](Self::kill) has been called.
    ///
    /// Long-running tasks poll this to stop early.
    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Whether the worker thread is still running.
    pub fn is_alive(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            accepted: self.shared.accepted.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
            abandoned: self.shared.abandoned.load(Ordering::Relaxed),
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.kill();
    }
}

impl std::fmt::Debug for BackgroundWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundWorker")
            .field("capacity", &self.shared.capacity)
            .field("pending", &self.pending())
            .finish()
    }
}

fn run(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.queue.is_empty() && !state.shutdown {
                shared.work_ready.wait(&mut state);
            }
            if state.shutdown {
                break;
            }
            let Some(task) = state.queue.pop_front() else {
                continue;
            };
            state.running = true;
            task
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(task));

        let mut state = shared.state.lock();
        state.running = false;
        match outcome {
            Ok(()) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                shared.panicked.fetch_add(1, Ordering::Relaxed);
                error!(panic = panic_message(&*payload), "background task panicked");
            }
        }
        if state.queue.is_empty() {
            shared.idle.notify_all();
        }
    }

    shared.idle.notify_all();
    debug!("background worker exiting");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic>"
    }
}
