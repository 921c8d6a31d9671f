/// Errors from submitting work to a [`BackgroundWorker`](crate::BackgroundWorker).
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The queue already holds `capacity` outstanding tasks.
    #[error("worker queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The worker has been killed and accepts no more tasks.
    #[error("worker is shut down")]
    Shutdown,

    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl WorkerError {
    /// Whether the rejection was caused by backpressure.
    pub fn is_queue_full(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
